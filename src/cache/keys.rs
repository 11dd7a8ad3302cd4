//! Cache key definitions for settings entries.
//!
//! Both entry kinds live in one namespace:
//! - path entries `setting_{category}_{key_name}` hold one typed value
//! - category entries `setting_{category}` hold the whole category as a map
//!
//! A category containing `_` would alias other entries (`A_b` against
//! `A.b`), so such categories are never cached.

/// Namespace shared by every settings cache entry.
pub const SETTINGS_CACHE_NAMESPACE: &str = "settings_cache";

const KEY_PREFIX: &str = "setting";
const KEY_SEPARATOR: char = '_';

/// Key of the aggregate entry for a whole category.
pub fn category_entry_key(category: &str) -> String {
    format!("{KEY_PREFIX}{KEY_SEPARATOR}{category}")
}

/// Key of the entry for a single setting.
pub fn path_entry_key(category: &str, key_name: &str) -> String {
    format!("{KEY_PREFIX}{KEY_SEPARATOR}{category}{KEY_SEPARATOR}{key_name}")
}

/// Whether entries for `category` get keys no other category can produce.
pub fn is_cacheable_category(category: &str) -> bool {
    !category.contains(KEY_SEPARATOR)
}
