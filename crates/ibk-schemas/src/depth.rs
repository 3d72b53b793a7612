use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::SchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DepthSide {
    Sell,
    Buy,
}

impl DepthSide {
    pub fn from_wire(side: i32) -> Result<Self, SchemaError> {
        match side {
            0 => Ok(Self::Sell),
            1 => Ok(Self::Buy),
            other => Err(SchemaError::InvalidDepthSide(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthOperation {
    Insert,
    Update,
    Remove,
}

impl DepthOperation {
    pub fn from_wire(operation: i32) -> Result<Self, SchemaError> {
        match operation {
            0 => Ok(Self::Insert),
            1 => Ok(Self::Update),
            2 => Ok(Self::Remove),
            other => Err(SchemaError::InvalidDepthOperation(other)),
        }
    }
}

/// Book slot: one price level on one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DepthKey {
    pub side: DepthSide,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDepth {
    pub position: i32,
    pub side: DepthSide,
    pub price: Decimal,
    pub size: Decimal,
    pub market_maker: String,
}

impl MarketDepth {
    pub fn from_wire(
        position: i32,
        side: i32,
        price: Decimal,
        size: Decimal,
        market_maker: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            position,
            side: DepthSide::from_wire(side)?,
            price,
            size,
            market_maker: market_maker.into(),
        })
    }

    pub fn key(&self) -> DepthKey {
        DepthKey {
            side: self.side,
            position: self.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn wire_side_mapping() {
        assert_eq!(DepthSide::from_wire(0), Ok(DepthSide::Sell));
        assert_eq!(DepthSide::from_wire(1), Ok(DepthSide::Buy));
        assert_eq!(DepthSide::from_wire(2), Err(SchemaError::InvalidDepthSide(2)));
    }

    #[test]
    fn key_is_side_and_position() {
        let d = MarketDepth::from_wire(3, 1, dec!(10.5), dec!(200), "NSDQ").unwrap();
        assert_eq!(d.key(), DepthKey { side: DepthSide::Buy, position: 3 });
    }

    #[test]
    fn unknown_operation_is_an_error() {
        assert_eq!(DepthOperation::from_wire(2), Ok(DepthOperation::Remove));
        assert!(DepthOperation::from_wire(7).is_err());
    }
}
