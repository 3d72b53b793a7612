use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{parse_broker_time, SchemaError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub count: i32,
    pub wap: Decimal,
}

impl Bar {
    #[allow(clippy::too_many_arguments)]
    pub fn from_wire(
        time: &str,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        count: i32,
        wap: Decimal,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            time: parse_broker_time(time)?,
            open,
            high,
            low,
            close,
            volume,
            count,
            wap,
        })
    }
}
