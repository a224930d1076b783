//! Hex codecs shared by the API layer and the canonical serializers.
//!
//! File hashes travel as bare hex; every other byte field carries a `0x`
//! prefix. Big integers are `0x`-prefixed hex strings on the wire.

pub type Result<T> = std::result::Result<T, HexError>;

#[derive(Debug)]
pub enum HexError {
    MissingPrefix,
    Empty,
    InvalidDigits(hex::FromHexError),
    InvalidInteger,
}

impl std::fmt::Display for HexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPrefix => write!(f, "hex string is missing the 0x prefix"),
            Self::Empty => write!(f, "hex string is empty"),
            Self::InvalidDigits(source) => write!(f, "invalid hex digits: {source}"),
            Self::InvalidInteger => {
                write!(f, "hex string is not a valid integer or does not fit the target type")
            }
        }
    }
}

impl std::error::Error for HexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidDigits(source) => Some(source),
            Self::MissingPrefix | Self::Empty | Self::InvalidInteger => None,
        }
    }
}

pub fn encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn encode_no_prefix(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

pub fn decode(value: &str) -> Result<Vec<u8>> {
    let stripped = value.strip_prefix("0x").ok_or(HexError::MissingPrefix)?;
    if stripped.is_empty() {
        return Err(HexError::Empty);
    }
    hex::decode(stripped).map_err(HexError::InvalidDigits)
}

pub fn decode_no_prefix(value: &str) -> Result<Vec<u8>> {
    if value.is_empty() {
        return Err(HexError::Empty);
    }
    hex::decode(value).map_err(HexError::InvalidDigits)
}

/// Decodes a `0x`-prefixed hex string into a u64.
pub fn decode_u64(value: &str) -> Result<u64> {
    let stripped = value.strip_prefix("0x").ok_or(HexError::MissingPrefix)?;
    if stripped.is_empty() {
        return Err(HexError::Empty);
    }
    u64::from_str_radix(stripped, 16).map_err(|_| HexError::InvalidInteger)
}

/// Decodes a `0x`-prefixed hex big integer. Settlement math fits u128.
pub fn decode_u128(value: &str) -> Result<u128> {
    let stripped = value.strip_prefix("0x").ok_or(HexError::MissingPrefix)?;
    if stripped.is_empty() {
        return Err(HexError::Empty);
    }
    u128::from_str_radix(stripped, 16).map_err(|_| HexError::InvalidInteger)
}

pub fn encode_u128(value: u128) -> String {
    format!("0x{value:x}")
}

/// Big-endian 8-byte encoding used for transaction nounces.
pub fn encode_u64_to_bytes(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

pub fn encode_u64_bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
