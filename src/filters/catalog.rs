use super::state::AmenityCategory;

/// A selectable subtype of an amenity category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtypeOption {
    pub value: &'static str,
    pub label: &'static str,
}

const fn option(value: &'static str, label: &'static str) -> SubtypeOption {
    SubtypeOption { value, label }
}

pub const WORSHIP_OPTIONS: &[SubtypeOption] = &[
    option("synagogue", "Synagogues"),
    option("church", "Churches"),
    option("mosque", "Mosques"),
    option("hindu_temple", "Hindu temples"),
    option("buddhist_temple", "Buddhist temples"),
];

pub const STORE_OPTIONS: &[SubtypeOption] = &[
    option("grocery", "Grocery stores"),
    option("home_improvement", "Home improvement"),
    option("appliance", "Appliance stores"),
    option("farm_supplies", "Farm supplies"),
];

pub const GYM_OPTIONS: &[SubtypeOption] = &[
    option("fitness_centre", "Fitness centres"),
    option("yoga", "Yoga studios"),
    option("martial_arts", "Martial arts"),
    option("climbing", "Climbing gyms"),
];

pub const SPORTS_OPTIONS: &[SubtypeOption] = &[
    option("swimming", "Swimming pools"),
    option("tennis", "Tennis courts"),
    option("soccer", "Soccer fields"),
    option("basketball", "Basketball courts"),
];

/// Subtypes offered for a category. Parks are toggle-gated and have none.
pub fn options_for(category: AmenityCategory) -> &'static [SubtypeOption] {
    match category {
        AmenityCategory::Parks => &[],
        AmenityCategory::Worship => WORSHIP_OPTIONS,
        AmenityCategory::Stores => STORE_OPTIONS,
        AmenityCategory::Gyms => GYM_OPTIONS,
        AmenityCategory::Sports => SPORTS_OPTIONS,
    }
}

pub fn is_known_subtype(category: AmenityCategory, value: &str) -> bool {
    options_for(category).iter().any(|o| o.value == value)
}
