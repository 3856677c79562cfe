use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use primitive_types::U256;
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
    de::{
        self,
        Visitor,
    },
};
use sha3::{
    Digest,
    Keccak256,
};
use std::{
    fmt,
    str::FromStr,
};

/// Starknet field element.
///
/// Values are kept canonical (strictly below the field prime), so two
/// addresses that differ only in leading zeros compare equal.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Felt(U256);

/// 2^251 + 17 * 2^192 + 1
fn field_prime() -> U256 {
    (U256::one() << 251) + (U256::from(17u8) << 192) + U256::one()
}

impl Felt {
    pub const ZERO: Felt = Felt(U256([0; 4]));

    pub fn from_u256(value: U256) -> Result<Self> {
        if value >= field_prime() {
            return Err(eyre!("value {value:#x} does not fit in a field element"));
        }
        Ok(Self(value))
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_u64(&self) -> Result<u64> {
        if self.0 > U256::from(u64::MAX) {
            return Err(eyre!("felt {self} overflows u64"));
        }
        Ok(self.0.low_u64())
    }

    pub fn to_u8(&self) -> Result<u8> {
        if self.0 > U256::from(u8::MAX) {
            return Err(eyre!("felt {self} overflows u8"));
        }
        Ok(self.0.low_u64() as u8)
    }

    pub fn to_u128(&self) -> Result<u128> {
        if self.0 > U256::from(u128::MAX) {
            return Err(eyre!("felt {self} overflows u128"));
        }
        Ok(self.0.low_u128())
    }

    pub fn to_bool(&self) -> Result<bool> {
        match self.to_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(eyre!("felt {other} is not a boolean")),
        }
    }

    /// Zero-padded 32-byte hex form, the way wallets print addresses.
    pub fn to_padded_hex(&self) -> String {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);
        format!("0x{}", hex::encode(bytes))
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Felt(U256::from(value))
    }
}

impl From<u8> for Felt {
    fn from(value: u8) -> Self {
        Felt(U256::from(value))
    }
}

impl From<u128> for Felt {
    fn from(value: u128) -> Self {
        Felt(U256::from(value))
    }
}

impl From<bool> for Felt {
    fn from(value: bool) -> Self {
        Felt(U256::from(value as u8))
    }
}

impl FromStr for Felt {
    type Err = color_eyre::Report;

    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let value = if let Some(digits) =
            raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))
        {
            if digits.is_empty() {
                U256::zero()
            } else {
                U256::from_str_radix(digits, 16)
                    .map_err(|e| eyre!("invalid hex felt {raw:?}: {e:?}"))?
            }
        } else {
            U256::from_dec_str(raw)
                .map_err(|e| eyre!("invalid decimal felt {raw:?}: {e:?}"))?
        };
        Felt::from_u256(value).wrap_err_with(|| format!("parsing felt {raw:?}"))
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Felt({:#x})", self.0)
    }
}

impl Serialize for Felt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct FeltVisitor;

impl Visitor<'_> for FeltVisitor {
    type Value = Felt;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a hex string, decimal string, integer or boolean")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Felt, E> {
        Felt::from_str(v).map_err(|e| E::custom(format!("{e:#}")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Felt, E> {
        Ok(Felt::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Felt, E> {
        u64::try_from(v)
            .map(Felt::from)
            .map_err(|_| E::custom(format!("negative felt {v}")))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Felt, E> {
        Ok(Felt::from(v))
    }
}

impl<'de> Deserialize<'de> for Felt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FeltVisitor)
    }
}

/// Entry-point selector: Keccak-256 of the name, truncated to 250 bits.
pub fn selector(entrypoint: &str) -> Felt {
    let digest = Keccak256::digest(entrypoint.as_bytes());
    let mask = (U256::one() << 250) - U256::one();
    Felt(U256::from_big_endian(digest.as_slice()) & mask)
}

/// Splits a u256 into its `(low, high)` calldata felts.
pub fn u256_to_felts(value: U256) -> [Felt; 2] {
    let low = value.low_u128();
    let high = (value >> 128).low_u128();
    [Felt::from(low), Felt::from(high)]
}

pub fn u256_from_felts(low: Felt, high: Felt) -> Result<U256> {
    let low = low.to_u128().wrap_err("u256 low limb")?;
    let high = high.to_u128().wrap_err("u256 high limb")?;
    Ok((U256::from(high) << 128) | U256::from(low))
}
