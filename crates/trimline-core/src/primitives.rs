//! # Innate Primitives
//!
//! Hardcoded constants shared by the layout, the sync outputs and the
//! session cache. They mirror the contract the product page and the lead
//! form agree on and are immutable at runtime.

/// Query parameter carrying the dash-joined codes of active options.
pub const OPTIONS_PARAM: &str = "options";

/// Separator used inside the `options` aggregate.
pub const OPTIONS_SEPARATOR: char = '-';

/// Query parameter carrying the product identifier.
pub const PRODUCT_ID_PARAM: &str = "id";

/// Number of color tabs the product data can describe.
pub const COLOR_TAB_COUNT: usize = 4;

/// Number of color subgroups per color tab.
pub const COLOR_SUBGROUPS_PER_TAB: usize = 2;

/// Options per equipment page when the product data gives no count.
pub const DEFAULT_PAGE_SIZE: usize = 9;

/// Number of equipment pages whose size the product data may override
/// (`options-count-tab-1` .. `options-count-tab-3`).
pub const SIZED_OPTION_PAGES: usize = 3;

/// Label prefix of equipment pages (`Equipment - 1`, `Equipment - 2`, ...).
pub const EQUIPMENT_PAGE_PREFIX: &str = "Equipment - ";

/// Separator between a color tab title and its subtitle in field values.
pub const GROUP_TITLE_SEPARATOR: &str = " | ";

/// Extra lead-form field holding the full configurator URL.
pub const LINK_FIELD: &str = "link";

/// Extra lead-form field holding the screenshot reference.
pub const SCREEN_FIELD: &str = "screen";

/// Value written to `SCREEN_FIELD` until a screenshot is attached.
pub const SCREEN_PLACEHOLDER: &str = "placeholder";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum number of controls a single product may declare.
///
/// Product data is external input; this bounds registry construction.
pub const MAX_CONTROLS: usize = 4096;

/// Maximum size of cached product data in bytes.
pub const MAX_CACHED_PRODUCT_SIZE: usize = 8 * 1024 * 1024;

/// Maximum number of keys replayed from the session cache.
pub const MAX_INITIAL_KEYS: usize = 1024;
