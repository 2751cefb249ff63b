use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type ProductId = i64;

/// One catalog row. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub price: i64,
    pub image_url: Option<String>,
    pub url: Option<String>,
    pub inventory: Option<f64>,
}

/// The person talking to the bot, as far as the order flow cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub user_id: u64,
    pub full_name: String,
    pub username: Option<String>,
}

impl Customer {
    pub fn from_telegram(user: &teloxide::types::User) -> Self {
        Self {
            user_id: user.id.0,
            full_name: user.full_name(),
            username: user.username.clone(),
        }
    }
}

/// Payload carried by inline keyboard buttons.
///
/// Encoded as `<action>_<product id>` (or a bare `support`), which keeps
/// tokens well under Telegram's 64-byte callback data limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Buy(ProductId),
    SendPhone(ProductId),
    Support,
}

impl ButtonAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonAction::Buy(_) => "buy",
            ButtonAction::SendPhone(_) => "sendphone",
            ButtonAction::Support => "support",
        }
    }
}

impl fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ButtonAction::Buy(id) | ButtonAction::SendPhone(id) => {
                write!(f, "{}_{}", self.as_str(), id)
            }
            ButtonAction::Support => f.write_str(self.as_str()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized button token: {0:?}")]
pub struct InvalidToken(pub String);

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(buy|sendphone)_(-?\d+)$").expect("valid token regex"));

impl FromStr for ButtonAction {
    type Err = InvalidToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "support" {
            return Ok(ButtonAction::Support);
        }
        let caps = TOKEN_RE
            .captures(s)
            .ok_or_else(|| InvalidToken(s.to_string()))?;
        let id: ProductId = caps[2]
            .parse()
            .map_err(|_| InvalidToken(s.to_string()))?;
        match &caps[1] {
            "buy" => Ok(ButtonAction::Buy(id)),
            _ => Ok(ButtonAction::SendPhone(id)),
        }
    }
}
