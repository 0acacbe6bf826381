// Real-time conversation subsystem.
// Implements: conversation identity resolution, the ordered message stream with
// live subscriptions and read tracking, and unread/shortlist aggregation.
// Persistence goes through `store::ChatStore` only.

pub mod handlers;
pub mod hub;
pub mod notifications;
pub mod resolver;
pub mod stream;
