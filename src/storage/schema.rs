//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.
//! Identifiers are stored as UUID text, dates as `YYYY-MM-DD` and timestamps
//! as fixed-width RFC3339 (UTC, microseconds) so text comparison orders them.

use sea_query::Iden;

/// Rooms table schema.
#[derive(Iden)]
pub enum Rooms {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "property_id"]
    PropertyId,
    #[iden = "capacity"]
    Capacity,
    #[iden = "current_occupancy"]
    CurrentOccupancy,
    #[iden = "monthly_rent"]
    MonthlyRent,
    #[iden = "status"]
    Status,
    #[iden = "version"]
    Version,
}

/// Reservations table schema.
#[derive(Iden)]
pub enum Reservations {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "room_id"]
    RoomId,
    #[iden = "check_in"]
    CheckIn,
    #[iden = "check_out"]
    CheckOut,
    #[iden = "released"]
    Released,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "released_at"]
    ReleasedAt,
}

/// Bookings table schema.
#[derive(Iden)]
pub enum Bookings {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "room_id"]
    RoomId,
    #[iden = "holder_id"]
    HolderId,
    #[iden = "check_in"]
    CheckIn,
    #[iden = "check_out"]
    CheckOut,
    #[iden = "status"]
    Status,
    #[iden = "amount_due"]
    AmountDue,
    #[iden = "promo_code"]
    PromoCode,
    #[iden = "reservation_id"]
    ReservationId,
    #[iden = "confirmed_order_id"]
    ConfirmedOrderId,
    #[iden = "cancellation_reason"]
    CancellationReason,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Promo codes table schema.
#[derive(Iden)]
pub enum PromoCodes {
    Table,
    #[iden = "code"]
    Code,
    #[iden = "percent_off"]
    PercentOff,
    #[iden = "amount_off"]
    AmountOff,
    #[iden = "active"]
    Active,
    #[iden = "expires_at"]
    ExpiresAt,
}

/// Payment orders table schema.
#[derive(Iden)]
pub enum PaymentOrders {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "booking_id"]
    BookingId,
    #[iden = "amount"]
    Amount,
    #[iden = "currency"]
    Currency,
    #[iden = "method"]
    Method,
    #[iden = "gateway_order_id"]
    GatewayOrderId,
    #[iden = "gateway_payment_id"]
    GatewayPaymentId,
    #[iden = "status"]
    Status,
    #[iden = "created_at"]
    CreatedAt,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Wallet transactions table schema.
#[derive(Iden)]
pub enum WalletTransactions {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "profile_id"]
    ProfileId,
    #[iden = "seq"]
    Seq,
    #[iden = "kind"]
    Kind,
    #[iden = "amount"]
    Amount,
    #[iden = "balance_after"]
    BalanceAfter,
    #[iden = "source"]
    Source,
    #[iden = "description"]
    Description,
    #[iden = "reference"]
    Reference,
    #[iden = "created_at"]
    CreatedAt,
}

/// Processed webhook events table schema.
#[derive(Iden)]
pub enum WebhookEvents {
    Table,
    #[iden = "event_id"]
    EventId,
    #[iden = "event_name"]
    EventName,
    #[iden = "processed_at"]
    ProcessedAt,
}

/// One-time codes table schema.
#[derive(Iden)]
pub enum OtpCodes {
    Table,
    #[iden = "subject"]
    Subject,
    #[iden = "code_hash"]
    CodeHash,
    #[iden = "issued_at"]
    IssuedAt,
    #[iden = "expires_at"]
    ExpiresAt,
    #[iden = "attempts"]
    Attempts,
}

/// SQL for creating the rooms table.
pub const CREATE_ROOMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS rooms (
    id TEXT PRIMARY KEY,
    property_id TEXT NOT NULL,
    capacity INTEGER NOT NULL CHECK (capacity > 0),
    current_occupancy INTEGER NOT NULL DEFAULT 0,
    monthly_rent INTEGER NOT NULL CHECK (monthly_rent >= 0),
    status TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0,
    CHECK (current_occupancy >= 0 AND current_occupancy <= capacity)
)
"#;

/// SQL for creating the reservations table.
pub const CREATE_RESERVATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS reservations (
    id TEXT PRIMARY KEY,
    room_id TEXT NOT NULL REFERENCES rooms(id),
    check_in TEXT NOT NULL,
    check_out TEXT NOT NULL,
    released INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    released_at TEXT,
    CHECK (check_out > check_in)
)
"#;

pub const CREATE_RESERVATIONS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_reservations_room_live ON reservations(room_id, released)";

/// SQL for creating the bookings table.
pub const CREATE_BOOKINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS bookings (
    id TEXT PRIMARY KEY,
    room_id TEXT NOT NULL REFERENCES rooms(id),
    holder_id TEXT NOT NULL,
    check_in TEXT NOT NULL,
    check_out TEXT NOT NULL,
    status TEXT NOT NULL,
    amount_due INTEGER NOT NULL CHECK (amount_due >= 0),
    promo_code TEXT,
    reservation_id TEXT NOT NULL REFERENCES reservations(id),
    confirmed_order_id TEXT,
    cancellation_reason TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (check_out > check_in)
)
"#;

pub const CREATE_BOOKINGS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_bookings_holder ON bookings(holder_id, created_at)";

/// SQL for creating the promo codes table.
pub const CREATE_PROMO_CODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS promo_codes (
    code TEXT PRIMARY KEY,
    percent_off INTEGER,
    amount_off INTEGER,
    active INTEGER NOT NULL DEFAULT 1,
    expires_at TEXT
)
"#;

/// SQL for creating the payment orders table.
pub const CREATE_PAYMENT_ORDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS payment_orders (
    id TEXT PRIMARY KEY,
    booking_id TEXT NOT NULL REFERENCES bookings(id),
    amount INTEGER NOT NULL CHECK (amount >= 0),
    currency TEXT NOT NULL,
    method TEXT NOT NULL,
    gateway_order_id TEXT UNIQUE,
    gateway_payment_id TEXT,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// At most one verified order per booking, enforced by the schema as well.
pub const CREATE_PAYMENT_ORDERS_VERIFIED_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_payment_orders_one_verified
    ON payment_orders(booking_id) WHERE status = 'verified'
"#;

/// SQL for creating the wallet transactions table.
pub const CREATE_WALLET_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS wallet_transactions (
    id TEXT PRIMARY KEY,
    profile_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    kind TEXT NOT NULL,
    amount INTEGER NOT NULL CHECK (amount > 0),
    balance_after INTEGER NOT NULL CHECK (balance_after >= 0),
    source TEXT NOT NULL,
    description TEXT NOT NULL,
    reference TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (profile_id, seq),
    UNIQUE (profile_id, reference)
)
"#;

/// SQL for creating the processed webhook events table.
pub const CREATE_WEBHOOK_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS webhook_events (
    event_id TEXT PRIMARY KEY,
    event_name TEXT NOT NULL,
    processed_at TEXT NOT NULL
)
"#;

/// SQL for creating the one-time codes table.
pub const CREATE_OTP_CODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS otp_codes (
    subject TEXT PRIMARY KEY,
    code_hash TEXT NOT NULL,
    issued_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0
)
"#;

/// Statements run by `init_schema`, in dependency order.
pub const SCHEMA: &[&str] = &[
    CREATE_ROOMS_TABLE,
    CREATE_RESERVATIONS_TABLE,
    CREATE_RESERVATIONS_INDEX,
    CREATE_BOOKINGS_TABLE,
    CREATE_BOOKINGS_INDEX,
    CREATE_PROMO_CODES_TABLE,
    CREATE_PAYMENT_ORDERS_TABLE,
    CREATE_PAYMENT_ORDERS_VERIFIED_INDEX,
    CREATE_WALLET_TRANSACTIONS_TABLE,
    CREATE_WEBHOOK_EVENTS_TABLE,
    CREATE_OTP_CODES_TABLE,
];
