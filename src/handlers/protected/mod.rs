pub mod auth;
pub mod dashboard;
pub mod invitations;
pub mod onboarding;
pub mod organizations;
pub mod team;
pub mod user;
