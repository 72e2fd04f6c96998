//! Queue names and message headers shared with order producers

/// Inbound queue carrying JSON `OrderMessage` bodies
pub const ORDERS_QUEUE: &str = "orders.new";

/// Dead-letter queue for messages the kitchen could not process
pub const DEAD_LETTER_QUEUE: &str = "orders.failed";

/// Header consulted when the message carries no `correlation_id` property
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Field injected into dead-lettered JSON payloads
pub const DLQ_FIELD: &str = "_dlq";
