use ibk_requests::{BrokerFailure, RequestKey, RequestType};
use ibk_schemas::{LogRecord, Severity};
use serde::Serialize;

const HISTORICAL_PREFIX: &str = "Historical Market Data Service error message";
const HISTORICAL_CANCELLED: &str = "API historical data query cancelled";
const HISTORICAL_NO_PERMISSIONS: &str = "No market data permissions for";
const HISTORICAL_NO_DATA: &str = "HMDS query returned no data";

// Order cancelled; account data unsubscribed; market data / historical /
// sec-def farm connectivity notices.
const INFO_CODES: &[i32] = &[202, 2100, 2104, 2106, 2107, 2108, 2158];

// Cancel of a non-cancellable order; order rejected; order message error;
// market data / historical farm broken; RTH attribute ignored; PnL cancel
// without subscription.
const WARNING_CODES: &[i32] = &[161, 201, 399, 2103, 2105, 2109, 10185, 10186];

// Broker software is out of date.
const CRITICAL_CODE: i32 = 503;

const CANCEL_TARGET_NOT_FOUND: i32 = 10147;
const CANCEL_TARGET_NOT_CANCELLABLE: i32 = 10148;
const HISTORICAL_MULTIPLEXED: i32 = 162;
const MAX_TICKERS: i32 = 101;
const NO_SECURITY_DEFINITION: i32 = 200;
const LOST_BY_DISCONNECT: i32 = 10182;
const LOST_BY_COMPETING_SESSION: i32 = 10197;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Fully handled by routing; not logged as an error.
    Custom,
    Debug,
    Info,
    Warning,
    /// Session-level error (no request to blame).
    Error,
    /// Failure addressed to one pending request.
    RequestError,
    Critical,
}

impl Category {
    pub fn severity(self) -> Severity {
        match self {
            Category::Custom => Severity::Warning,
            Category::Debug => Severity::Debug,
            Category::Info => Severity::Info,
            Category::Warning => Severity::Warning,
            Category::Error | Category::RequestError => Severity::Error,
            Category::Critical => Severity::Critical,
        }
    }
}

/// Sub-cases of the historical-data code, distinguished by message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoricalOutcome {
    Cancelled,
    NoPermissions,
    NoData,
    Other,
    /// The required prefix was missing.
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    None,
    /// Terminate the matching request with `failure`.
    FailRequest {
        key: RequestKey,
        failure: BrokerFailure,
        should_exist: bool,
    },
    /// Deliver `true` to the matching request, then complete it.
    CompleteRequest { key: RequestKey },
    SessionError,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub record: LogRecord,
    pub category: Category,
    pub action: Action,
    pub historical: Option<HistoricalOutcome>,
}

/// Pure mapping from a broker message to a log record and a routing decision.
pub fn classify(id: i32, code: i32, message: &str) -> Classification {
    let terminal = || BrokerFailure::Terminal {
        id,
        code,
        message: message.to_string(),
    };
    let per_id = |failure: BrokerFailure| Action::FailRequest {
        key: RequestKey::any(id),
        failure,
        should_exist: false,
    };
    let text = || message.to_string();

    let mut historical = None;
    let (category, action) = match code {
        c if INFO_CODES.contains(&c) => (Category::Info, Action::None),
        c if WARNING_CODES.contains(&c) => (Category::Warning, Action::None),
        CRITICAL_CODE => (Category::Critical, Action::Fatal),
        CANCEL_TARGET_NOT_FOUND => (
            Category::Custom,
            Action::FailRequest {
                key: RequestKey::new(RequestType::ReqOrderCancel, id),
                failure: terminal(),
                should_exist: true,
            },
        ),
        CANCEL_TARGET_NOT_CANCELLABLE => (
            Category::Warning,
            Action::CompleteRequest {
                key: RequestKey::new(RequestType::ReqOrderCancel, id),
            },
        ),
        MAX_TICKERS => (
            Category::RequestError,
            per_id(BrokerFailure::MaxTickers { id, message: text() }),
        ),
        NO_SECURITY_DEFINITION => (
            Category::RequestError,
            per_id(BrokerFailure::NoSecurityDefinition { id, message: text() }),
        ),
        LOST_BY_DISCONNECT => (
            Category::RequestError,
            per_id(BrokerFailure::SubscriptionLostByDisconnect { id, message: text() }),
        ),
        LOST_BY_COMPETING_SESSION => (
            Category::RequestError,
            per_id(BrokerFailure::SubscriptionLostByCompetingSession { id, message: text() }),
        ),
        HISTORICAL_MULTIPLEXED => {
            let (outcome, action) = classify_historical(id, code, message);
            historical = Some(outcome);
            (Category::Debug, action)
        }
        _ if id >= 0 => (Category::RequestError, per_id(terminal())),
        _ => (Category::Error, Action::SessionError),
    };

    Classification {
        record: LogRecord {
            severity: category.severity(),
            id,
            code,
            message: message.to_string(),
        },
        category,
        action,
        historical,
    }
}

fn classify_historical(id: i32, code: i32, message: &str) -> (HistoricalOutcome, Action) {
    let fail = |failure| Action::FailRequest {
        key: RequestKey::any(id),
        failure,
        should_exist: true,
    };

    let Some(rest) = message.strip_prefix(HISTORICAL_PREFIX) else {
        return (
            HistoricalOutcome::Unexpected,
            fail(BrokerFailure::Terminal {
                id,
                code,
                message: message.to_string(),
            }),
        );
    };
    // The prefix is followed by one separator character (usually ':').
    let mut chars = rest.chars();
    chars.next();
    let info = chars.as_str();

    if info.starts_with(HISTORICAL_CANCELLED) {
        (HistoricalOutcome::Cancelled, Action::None)
    } else if info.starts_with(HISTORICAL_NO_PERMISSIONS) {
        (
            HistoricalOutcome::NoPermissions,
            fail(BrokerFailure::NoPermissions {
                id,
                message: info.to_string(),
            }),
        )
    } else if info.starts_with(HISTORICAL_NO_DATA) {
        (
            HistoricalOutcome::NoData,
            fail(BrokerFailure::NoData {
                id,
                message: info.to_string(),
            }),
        )
    } else {
        (
            HistoricalOutcome::Other,
            fail(BrokerFailure::Client {
                id,
                message: message.to_string(),
            }),
        )
    }
}
