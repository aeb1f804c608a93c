use crate::infrastructure::mite_client::MiteClient;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum AuthorizationCheck {
    Granted,
    Denied,
    Unreachable(String),
}

impl AuthorizationCheck {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

pub async fn check_authorization<C>(client: &C) -> AuthorizationCheck
where
    C: MiteClient + ?Sized,
{
    match client.is_authorized().await {
        Ok(true) => AuthorizationCheck::Granted,
        Ok(false) => AuthorizationCheck::Denied,
        Err(error) if error.is_unauthorized() => AuthorizationCheck::Denied,
        Err(error) => AuthorizationCheck::Unreachable(error.to_string()),
    }
}

pub async fn verify<C>(client: &C) -> bool
where
    C: MiteClient + ?Sized,
{
    let check = check_authorization(client).await;
    match &check {
        AuthorizationCheck::Granted => tracing::debug!("mite credentials verified"),
        AuthorizationCheck::Denied => tracing::warn!("mite rejected the configured credentials"),
        AuthorizationCheck::Unreachable(error) => {
            tracing::warn!(error = %error, "mite authorization probe failed")
        }
    }
    check.is_granted()
}
