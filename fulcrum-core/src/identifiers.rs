//! Interned exchange identifiers and the composite ids used on the wire.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};

const UNSPECIFIED_EXCHANGE_ID: u16 = 0;

static EXCHANGES: Lazy<RwLock<ExchangeRegistry>> = Lazy::new(|| {
    RwLock::new(ExchangeRegistry {
        next_id: 1,
        ..ExchangeRegistry::default()
    })
});

/// Compact handle to an exchange name (`SHFE`, `DCE`, ...).
///
/// Exchanges are few and long-lived, so names are interned once and the
/// handle is `Copy`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ExchangeId(u16);

impl ExchangeId {
    pub const UNSPECIFIED: Self = Self(UNSPECIFIED_EXCHANGE_ID);

    /// Intern an exchange name, returning the existing handle when known.
    pub fn register(name: impl AsRef<str>) -> Self {
        let name = canonicalize(name.as_ref());
        if name.is_empty() {
            return Self::UNSPECIFIED;
        }
        let mut registry = EXCHANGES.write();
        if let Some(id) = registry.name_to_id.get(&name) {
            return *id;
        }
        let id = ExchangeId(registry.next_id);
        registry.next_id = registry.next_id.saturating_add(1);
        let stored = leak_string(name.clone());
        registry.id_to_name.insert(id, stored);
        registry.name_to_id.insert(name, id);
        id
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        if self == Self::UNSPECIFIED {
            return "UNSPECIFIED";
        }
        let registry = EXCHANGES.read();
        registry
            .id_to_name
            .get(&self)
            .copied()
            .unwrap_or_else(|| leak_string(format!("EXCHANGE#{}", self.0)))
    }

    #[must_use]
    pub fn is_specified(self) -> bool {
        self.0 != UNSPECIFIED_EXCHANGE_ID
    }

    /// Whether this exchange reports today lots through the dedicated
    /// today-position field of the investor-position row.
    #[must_use]
    pub fn splits_today_position(self) -> bool {
        matches!(self.name(), "SHFE" | "INE")
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::UNSPECIFIED
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExchangeId {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(IdentifierParseError::new("exchange", s));
        }
        Ok(Self::register(s))
    }
}

impl From<&str> for ExchangeId {
    fn from(value: &str) -> Self {
        Self::register(value)
    }
}

impl Serialize for ExchangeId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ExchangeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

#[derive(Default)]
struct ExchangeRegistry {
    name_to_id: HashMap<String, ExchangeId>,
    id_to_name: HashMap<ExchangeId, &'static str>,
    next_id: u16,
}

fn canonicalize(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

fn leak_string(value: String) -> &'static str {
    Box::leak(value.into_boxed_str())
}

/// Engine-side address of a tradable contract: `instrument_id.exchange_id`.
///
/// The gateway addresses instruments by instrument id alone; the engine
/// carries the exchange alongside it and translates in both directions.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Symbol {
    pub instrument: String,
    pub exchange: ExchangeId,
}

impl Symbol {
    pub fn new(instrument: impl Into<String>, exchange: impl Into<ExchangeId>) -> Self {
        Self {
            instrument: instrument.into(),
            exchange: exchange.into(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.instrument, self.exchange)
    }
}

impl FromStr for Symbol {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (instrument, exchange) = s
            .rsplit_once('.')
            .ok_or_else(|| IdentifierParseError::new("symbol", s))?;
        if instrument.is_empty() || exchange.is_empty() {
            return Err(IdentifierParseError::new("symbol", s));
        }
        Ok(Self::new(instrument, ExchangeId::register(exchange)))
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| Self {
            instrument: value.to_string(),
            exchange: ExchangeId::UNSPECIFIED,
        })
    }
}

impl Serialize for Symbol {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Exchange-assigned order identity: `exchange_id:trader_id:order_local_id`.
///
/// Stable once the exchange has accepted the order.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct OrderId {
    pub exchange: ExchangeId,
    pub trader_id: String,
    pub local_id: String,
}

impl OrderId {
    pub fn new(
        exchange: impl Into<ExchangeId>,
        trader_id: impl Into<String>,
        local_id: impl Into<String>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            trader_id: trader_id.into(),
            local_id: local_id.into(),
        }
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.exchange, self.trader_id, self.local_id)
    }
}

impl FromStr for OrderId {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(exchange), Some(trader), Some(local))
                if !exchange.is_empty() && !local.is_empty() =>
            {
                Ok(Self::new(ExchangeId::register(exchange), trader, local))
            }
            _ => Err(IdentifierParseError::new("order id", s)),
        }
    }
}

impl Serialize for OrderId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Client-minted submission identity: `front_id:session_id:order_ref`.
///
/// Returned to the requester at submission so results can be correlated
/// before the exchange assigns its own id.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ReceiptId {
    pub front_id: i32,
    pub session_id: i32,
    pub order_ref: i64,
}

impl ReceiptId {
    #[must_use]
    pub const fn new(front_id: i32, session_id: i32, order_ref: i64) -> Self {
        Self {
            front_id,
            session_id,
            order_ref,
        }
    }
}

impl fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.front_id, self.session_id, self.order_ref)
    }
}

impl FromStr for ReceiptId {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let parse = |piece: Option<&str>| {
            piece
                .and_then(|p| p.trim().parse::<i64>().ok())
                .ok_or_else(|| IdentifierParseError::new("receipt id", s))
        };
        let front = parse(parts.next())?;
        let session = parse(parts.next())?;
        let order_ref = parse(parts.next())?;
        Ok(Self::new(front as i32, session as i32, order_ref))
    }
}

impl Serialize for ReceiptId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ReceiptId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Raised when an identifier string does not match its expected shape.
#[derive(Clone, Debug)]
pub struct IdentifierParseError {
    msg: String,
}

impl IdentifierParseError {
    fn new(kind: &str, raw: impl AsRef<str>) -> Self {
        Self {
            msg: format!("invalid {kind}: '{}'", raw.as_ref()),
        }
    }
}

impl fmt::Display for IdentifierParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for IdentifierParseError {}
