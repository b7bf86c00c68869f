//! Category catalog of the natural-event provider.

/// Category identifiers known to the provider, in display order.
pub const DEFAULT_CATEGORIES: [&str; 9] = [
    "dustHaze",
    "manmade",
    "seaLakeIce",
    "severeStorms",
    "snow",
    "volcanoes",
    "waterColor",
    "floods",
    "wildfires",
];

/// Human-readable label for a category identifier, if it is a known one.
#[must_use]
pub fn label(id: &str) -> Option<&'static str> {
    let label = match id {
        "dustHaze" => "Dust & Haze",
        "manmade" => "Manmade",
        "seaLakeIce" => "Sea & Lake Ice",
        "severeStorms" => "Severe Storms",
        "snow" => "Snow",
        "volcanoes" => "Volcanoes",
        "waterColor" => "Water Color",
        "floods" => "Floods",
        "wildfires" => "Wildfires",
        _ => return None,
    };
    Some(label)
}

/// The default category selection as owned strings.
#[must_use]
pub fn default_selection() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(ToString::to_string).collect()
}
