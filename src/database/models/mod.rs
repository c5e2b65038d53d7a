pub mod invitation;
pub mod membership;
pub mod organization;
pub mod session;
pub mod user;

pub use invitation::Invitation;
pub use membership::{Member, Membership};
pub use organization::{NewOrganization, Organization, UserOrganization};
pub use session::Session;
pub use user::{NewUser, User};

use sqlx::{postgres::PgRow, Row};
use std::str::FromStr;

use crate::types::UnknownVariant;

/// Read a text column and parse it into one of the domain enums.
pub(crate) fn text_column<T>(row: &PgRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: UnknownVariant| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
