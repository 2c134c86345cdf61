pub const EMAIL_MAX_LENGTH: usize = 255;
pub const NAME_MAX_LENGTH: usize = 100;
pub const PASSWORD_MIN_LENGTH: usize = 5;

pub const TAG_NAME_MAX_LENGTH: usize = 255;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 255;
pub const RECIPE_TITLE_MAX_LENGTH: usize = 255;

/// NUMERIC(5, 2)
pub const PRICE_MAX_DIGITS: u32 = 5;
pub const PRICE_DECIMAL_PLACES: u32 = 2;

/// Raw bytes behind a token key, hex encoded to 40 characters
pub const TOKEN_BYTES: usize = 20;

pub const BODY_SIZE_LIMIT: u64 = 1024 * 16;

pub const AUTH_SCHEMES: &[&str] = &["token", "bearer"];
