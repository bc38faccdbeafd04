use crate::model::error::ApiError;

#[derive(PartialEq, Debug)]
pub enum ShareAccessError {
    /// the share's expiry date has passed
    Expired,
    /// the share is protected and no password was given
    PasswordRequired,
    /// the password was checked and rejected
    WrongPassword,
    /// the server accepted the password but didn't hand out a token
    MissingToken,
    Api(ApiError),
}

impl From<ApiError> for ShareAccessError {
    fn from(value: ApiError) -> Self {
        Self::Api(value)
    }
}
