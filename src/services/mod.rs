pub mod dashboard_service;
pub mod error;
pub mod mailer;
pub mod onboarding_service;
pub mod organization_service;
pub mod team_service;
pub mod user_service;

pub use dashboard_service::{DashboardService, DashboardSummary};
pub use error::{ServiceError, ServiceResult, UNAUTHORIZED_INVITATION_DELETE};
pub use mailer::{LogMailer, MailError, Mailer, MemoryMailer, OutgoingMail};
pub use onboarding_service::{OnboardingProgress, OnboardingService};
pub use organization_service::{OrganizationDetails, OrganizationService};
pub use team_service::TeamService;
pub use user_service::{AuthenticatedSession, ReceivedInvitation, UserService};
