//! Internal implementation of case identifiers.
//!
//! This module contains the canonical UUID wrapper plus the backend and offline case
//! identifier formats built on top of it.

use crate::{UuidError, UuidResult, BACKEND_ID_PREFIX, OFFLINE_ID_PREFIX};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

const OFFLINE_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3f";
const BACKEND_SUFFIX_LEN: usize = 8;

/// Canonical UUID representation (32 lowercase hex characters, no hyphens).
///
/// Once constructed, the contained UUID is guaranteed to display in canonical form.
///
/// # Construction
/// - [`UuidService::new`] generates a new random UUID.
/// - [`UuidService::parse`] validates an externally supplied identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UuidService(Uuid);

impl Default for UuidService {
    fn default() -> Self {
        Self::new()
    }
}

impl UuidService {
    /// Generates a new random (version 4) UUID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses a UUID string that must already be in canonical form.
    ///
    /// This does **not** normalise other common UUID forms (hyphenated or uppercase).
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "UUID must be 32 lowercase hex characters without hyphens, got: '{}'",
                input
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("invalid UUID '{}': {}", input, e)))
    }

    /// Returns the UUID as a `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is in canonical UUID form.
    ///
    /// This is a purely syntactic check: exactly 32 bytes of `0-9` / `a-f`.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }
}

impl fmt::Display for UuidService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for UuidService {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UuidService::parse(s)
    }
}

/// Identifier assigned by the review backend: `CASE-XXXXXXXX`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BackendCaseId(String);

impl BackendCaseId {
    /// Allocates a fresh backend identifier from the first 8 hex characters of a random UUID.
    pub fn generate() -> Self {
        let simple = UuidService::new().to_string();
        Self(format!(
            "{}{}",
            BACKEND_ID_PREFIX,
            simple[..BACKEND_SUFFIX_LEN].to_ascii_uppercase()
        ))
    }

    /// Validates an identifier received from the backend.
    ///
    /// The prefix is mandatory; the suffix must be non-empty ASCII alphanumeric (the backend
    /// currently issues 8 uppercase hex characters, but older records may differ in length).
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if the prefix is missing or the suffix is malformed.
    pub fn parse(input: &str) -> UuidResult<Self> {
        let suffix = input.strip_prefix(BACKEND_ID_PREFIX).ok_or_else(|| {
            UuidError::InvalidInput(format!(
                "backend case id must start with '{}', got: '{}'",
                BACKEND_ID_PREFIX, input
            ))
        })?;

        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(UuidError::InvalidInput(format!(
                "backend case id suffix must be ASCII alphanumeric, got: '{}'",
                input
            )));
        }

        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier allocated on the device for a case that could not be delivered.
///
/// Format:
/// `OFFLINE-YYYYMMDDTHHMMSS.mmmZ-<canonical_uuid>`
///
/// # Monotonicity Guarantee
///
/// When calling [`OfflineCaseId::generate`] with the previously allocated identifier, the
/// timestamp is guaranteed to be strictly greater than the previous one (incremented by at
/// least 1ms if necessary), so identifiers sort in allocation order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OfflineCaseId {
    timestamp: DateTime<Utc>,
    uuid: UuidService,
}

impl OfflineCaseId {
    /// Allocate a new offline identifier.
    ///
    /// If `last` is provided, the timestamp is strictly greater than the last one.
    pub fn generate(last: Option<&OfflineCaseId>) -> Self {
        // Millisecond precision, so an id equals itself after a round trip through its text form.
        let now = Utc::now().trunc_subsecs(3);

        let timestamp = match last {
            Some(prev) if now <= prev.timestamp => prev.timestamp + Duration::milliseconds(1),
            _ => now,
        };

        Self {
            timestamp,
            uuid: UuidService::new(),
        }
    }

    /// Returns the timestamp component of this identifier.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the random component of this identifier.
    pub fn uuid(&self) -> &UuidService {
        &self.uuid
    }
}

impl FromStr for OfflineCaseId {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix(OFFLINE_ID_PREFIX).ok_or_else(|| {
            UuidError::InvalidInput(format!(
                "offline case id must start with '{}', got: '{}'",
                OFFLINE_ID_PREFIX, s
            ))
        })?;

        let (ts_str, uuid_str) = rest.split_once('-').ok_or_else(|| {
            UuidError::InvalidInput(format!("Invalid offline case id format: '{}'", s))
        })?;

        let ts_no_z = ts_str.strip_suffix('Z').ok_or_else(|| {
            UuidError::InvalidInput(format!("Timestamp must end with 'Z': '{}'", ts_str))
        })?;

        let naive = chrono::NaiveDateTime::parse_from_str(ts_no_z, OFFLINE_TIMESTAMP_FORMAT)
            .map_err(|e| {
                UuidError::InvalidInput(format!("Invalid timestamp format '{}': {}", ts_str, e))
            })?;

        Ok(Self {
            timestamp: DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc),
            uuid: UuidService::parse(uuid_str)?,
        })
    }
}

impl fmt::Display for OfflineCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}Z-{}",
            OFFLINE_ID_PREFIX,
            self.timestamp.format(OFFLINE_TIMESTAMP_FORMAT),
            self.uuid
        )
    }
}

/// Any case identifier, tagged by the namespace it was allocated in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CaseId {
    Backend(BackendCaseId),
    Offline(OfflineCaseId),
}

impl CaseId {
    /// True if the identifier was allocated on the device and not yet replaced by a backend id.
    pub fn is_offline(&self) -> bool {
        matches!(self, CaseId::Offline(_))
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseId::Backend(id) => id.fmt(f),
            CaseId::Offline(id) => id.fmt(f),
        }
    }
}

impl FromStr for CaseId {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with(OFFLINE_ID_PREFIX) {
            s.parse().map(CaseId::Offline)
        } else {
            BackendCaseId::parse(s).map(CaseId::Backend)
        }
    }
}

impl From<BackendCaseId> for CaseId {
    fn from(id: BackendCaseId) -> Self {
        CaseId::Backend(id)
    }
}

impl From<OfflineCaseId> for CaseId {
    fn from(id: OfflineCaseId) -> Self {
        CaseId::Offline(id)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for CaseId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for CaseId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_valid_uuid() {
        let canonical = UuidService::new().to_string();

        assert_eq!(canonical.len(), 32);
        assert!(UuidService::is_canonical(&canonical));
    }

    #[test]
    fn test_parse_rejects_hyphenated_uuid() {
        let result = UuidService::parse("550e8400-e29b-41d4-a716-446655440000");

        match result {
            Err(UuidError::InvalidInput(msg)) => {
                assert!(msg.contains("32 lowercase hex characters"));
            }
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_parse_rejects_uppercase_uuid() {
        assert!(UuidService::parse("550E8400E29B41D4A716446655440000").is_err());
    }

    #[test]
    fn test_backend_id_generate_format() {
        let id = BackendCaseId::generate();
        let s = id.to_string();

        assert!(s.starts_with("CASE-"));
        assert_eq!(s.len(), "CASE-".len() + 8);
        assert!(s["CASE-".len()..]
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'F')));
    }

    #[test]
    fn test_backend_id_parse_rejects_missing_prefix() {
        assert!(BackendCaseId::parse("3F9A1C2B").is_err());
        assert!(BackendCaseId::parse("CASE-").is_err());
        assert!(BackendCaseId::parse("CASE-1023").is_ok());
    }

    #[test]
    fn test_offline_id_generate_monotonic_same_instant() {
        let first = OfflineCaseId::generate(None);
        // No sleep - force the monotonic increment logic
        let second = OfflineCaseId::generate(Some(&first));

        assert!(second.timestamp() > first.timestamp());
        assert_ne!(first.uuid(), second.uuid());
    }

    #[test]
    fn test_offline_id_display_format() {
        let displayed = OfflineCaseId::generate(None).to_string();

        assert!(displayed.starts_with("OFFLINE-20"));
        let rest = displayed.strip_prefix("OFFLINE-").unwrap();
        let (ts, uuid) = rest.split_once('-').unwrap();
        assert!(ts.ends_with('Z'));
        assert!(UuidService::is_canonical(uuid));
    }

    #[test]
    fn test_offline_id_parse_valid() {
        let id: OfflineCaseId = "OFFLINE-20261017T143522.045Z-550e8400e29b41d4a716446655440000"
            .parse()
            .unwrap();

        assert_eq!(id.uuid().to_string(), "550e8400e29b41d4a716446655440000");
        assert_eq!(
            id.to_string(),
            "OFFLINE-20261017T143522.045Z-550e8400e29b41d4a716446655440000"
        );
    }

    #[test]
    fn test_generated_offline_id_equals_its_parsed_text() {
        let id = OfflineCaseId::generate(None);
        let parsed: OfflineCaseId = id.to_string().parse().unwrap();

        assert_eq!(parsed, id);
    }

    #[test]
    fn test_offline_id_parse_missing_z_suffix() {
        let result: UuidResult<OfflineCaseId> =
            "OFFLINE-20261017T143522.045-550e8400e29b41d4a716446655440000".parse();

        match result {
            Err(UuidError::InvalidInput(msg)) => assert!(msg.contains("must end with 'Z'")),
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_offline_id_parse_invalid_timestamp() {
        let result: UuidResult<OfflineCaseId> =
            "OFFLINE-20261399T143522.045Z-550e8400e29b41d4a716446655440000".parse();

        match result {
            Err(UuidError::InvalidInput(msg)) => assert!(msg.contains("Invalid timestamp format")),
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_case_id_dispatches_on_prefix() {
        let backend: CaseId = "CASE-3F9A1C2B".parse().unwrap();
        let offline: CaseId = "OFFLINE-20261017T143522.045Z-550e8400e29b41d4a716446655440000"
            .parse()
            .unwrap();

        assert!(!backend.is_offline());
        assert!(offline.is_offline());
        assert!("case-3f9a1c2b".parse::<CaseId>().is_err());
    }

    #[test]
    fn test_case_id_serializes_as_string() {
        let id: CaseId = "CASE-3F9A1C2B".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();

        assert_eq!(json, "\"CASE-3F9A1C2B\"");
        let back: CaseId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
