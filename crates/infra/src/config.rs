//! Environment-driven configuration.
//!
//! | variable | default |
//! |---|---|
//! | `BIND_ADDR` | `0.0.0.0:8080` |
//! | `JWT_SECRET` | insecure dev secret (logged as a warning) |
//! | `DELIVERY_CITY` | `Kochi` |
//! | `DELIVERY_PINCODE_PREFIXES` | empty: every pincode in the city |
//! | `DELIVERY_FEE_PAISE` | `4000` |
//! | `FREE_DELIVERY_THRESHOLD_PAISE` | `49900` |
//! | `MINIMUM_ORDER_PAISE` | `0` |
//! | `PAYMENT_GATEWAY` | `razorpay` when key id and secret are set, otherwise `offline` |
//! | `RAZORPAY_KEY_ID` / `RAZORPAY_KEY_SECRET` / `RAZORPAY_WEBHOOK_SECRET` | dev values in offline mode |
//! | `RAZORPAY_API_BASE` | `https://api.razorpay.com` |
//! | `USE_PERSISTENT_STORES` / `DATABASE_URL` | `false`; Postgres when true |

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;

use spicecart_core::Money;
use spicecart_orders::DeliveryPolicy;

const DEV_JWT_SECRET: &str = "spicecart-dev-secret";
const OFFLINE_KEY_ID: &str = "rzp_test_offline";
const OFFLINE_KEY_SECRET: &str = "offline-key-secret";
const OFFLINE_WEBHOOK_SECRET: &str = "offline-webhook-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is required {context}")]
    Missing { name: &'static str, context: &'static str },

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    Razorpay,
    /// Local gateway that mints order ids without network calls.
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentsConfig {
    pub gateway: GatewayKind,
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    InMemory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub delivery: DeliveryPolicy,
    pub payments: PaymentsConfig,
    pub persistence: Persistence,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = match get("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let delivery = DeliveryPolicy {
            city: get("DELIVERY_CITY").unwrap_or_else(|| "Kochi".to_string()),
            pincode_prefixes: get("DELIVERY_PINCODE_PREFIXES")
                .map(|raw| parse_prefixes(&raw))
                .transpose()?
                .unwrap_or_default(),
            delivery_fee: paise(&get, "DELIVERY_FEE_PAISE", 4_000)?,
            free_delivery_threshold: paise(&get, "FREE_DELIVERY_THRESHOLD_PAISE", 49_900)?,
            minimum_order: paise(&get, "MINIMUM_ORDER_PAISE", 0)?,
        };

        let payments = payments_config(&get)?;

        let use_persistent = match get("USE_PERSISTENT_STORES") {
            Some(raw) => parse_bool("USE_PERSISTENT_STORES", &raw)?,
            None => false,
        };
        let persistence = if use_persistent {
            Persistence::Postgres {
                database_url: get("DATABASE_URL").ok_or(ConfigError::Missing {
                    name: "DATABASE_URL",
                    context: "when USE_PERSISTENT_STORES=true",
                })?,
            }
        } else {
            Persistence::InMemory
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            delivery,
            payments,
            persistence,
        })
    }
}

fn payments_config(get: &impl Fn(&str) -> Option<String>) -> Result<PaymentsConfig, ConfigError> {
    let key_id = get("RAZORPAY_KEY_ID");
    let key_secret = get("RAZORPAY_KEY_SECRET");
    let webhook_secret = get("RAZORPAY_WEBHOOK_SECRET");
    let api_base = get("RAZORPAY_API_BASE")
        .unwrap_or_else(|| "https://api.razorpay.com".to_string())
        .trim_end_matches('/')
        .to_string();

    let gateway = match get("PAYMENT_GATEWAY").map(|g| g.to_ascii_lowercase()).as_deref() {
        Some("razorpay") => GatewayKind::Razorpay,
        Some("offline") => GatewayKind::Offline,
        Some(other) => {
            return Err(ConfigError::Invalid {
                name: "PAYMENT_GATEWAY",
                value: other.to_string(),
                reason: "expected 'razorpay' or 'offline'".to_string(),
            });
        }
        None if key_id.is_some() && key_secret.is_some() => GatewayKind::Razorpay,
        None => GatewayKind::Offline,
    };

    match gateway {
        GatewayKind::Razorpay => {
            const CONTEXT: &str = "when PAYMENT_GATEWAY=razorpay";
            Ok(PaymentsConfig {
                gateway,
                key_id: key_id.ok_or(ConfigError::Missing {
                    name: "RAZORPAY_KEY_ID",
                    context: CONTEXT,
                })?,
                key_secret: key_secret.ok_or(ConfigError::Missing {
                    name: "RAZORPAY_KEY_SECRET",
                    context: CONTEXT,
                })?,
                webhook_secret: webhook_secret.ok_or(ConfigError::Missing {
                    name: "RAZORPAY_WEBHOOK_SECRET",
                    context: CONTEXT,
                })?,
                api_base,
            })
        }
        GatewayKind::Offline => Ok(PaymentsConfig {
            gateway,
            key_id: key_id.unwrap_or_else(|| OFFLINE_KEY_ID.to_string()),
            key_secret: key_secret.unwrap_or_else(|| OFFLINE_KEY_SECRET.to_string()),
            webhook_secret: webhook_secret.unwrap_or_else(|| OFFLINE_WEBHOOK_SECRET.to_string()),
            api_base,
        }),
    }
}

fn paise(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Money, ConfigError> {
    match get(name) {
        Some(raw) => raw.parse::<u64>().map(Money::from_paise).map_err(|e| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(Money::from_paise(default)),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_prefixes(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p.len() <= 6 && p.chars().all(|c| c.is_ascii_digit()) {
                Ok(p.to_string())
            } else {
                Err(ConfigError::Invalid {
                    name: "DELIVERY_PINCODE_PREFIXES",
                    value: p.to_string(),
                    reason: "prefixes must be 1 to 6 digits".to_string(),
                })
            }
        })
        .collect()
}
