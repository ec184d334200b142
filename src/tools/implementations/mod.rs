//! Built-in tool implementations
//!
//! Tools:
//! - convert_currency: fixed-rate currency conversion (safe to retry)
//! - lookup_holidays: public holiday lookup per region (safe to retry)
//! - create_ticket: support ticket creation (side-effecting)

pub mod currency;
pub mod holidays;
pub mod tickets;

pub use currency::CurrencyConverter;
pub use holidays::HolidayLookup;
pub use tickets::CreateTicket;
