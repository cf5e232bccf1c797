use once_cell::sync::Lazy;
use std::collections::HashMap;
use thiserror::Error;

/// A supported map: its registered name and grid dimensions. The planner's
/// scenario rows carry these dimensions verbatim, so an entry here is the
/// single source of truth for a map's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Map {
    pub map_name: &'static str,
    pub width: usize,
    pub height: usize,
}

/// An unrecognized map name was passed where a registered map is required.
/// Unknown maps are rejected outright, never silently substituted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported map kind: {0:?}")]
pub struct UnsupportedMapKind(pub String);

const MAPS_DATA: &[Map] = &[
    Map {
        map_name: "warehouse_small",
        width: 33,
        height: 57,
    },
    Map {
        map_name: "warehouse_large",
        width: 140,
        height: 500,
    },
    Map {
        map_name: "warehouse-20-40-10-2-2",
        width: 164,
        height: 340,
    },
    Map {
        map_name: "random-32-32-10",
        width: 32,
        height: 32,
    },
    Map {
        map_name: "random-32-32-20",
        width: 32,
        height: 32,
    },
    Map {
        map_name: "test-5-5",
        width: 5,
        height: 5,
    },
];

pub fn all_maps() -> &'static [Map] {
    MAPS_DATA
}

// Build a name -> map table once for O(1) lookup.
static MAP_TABLE: Lazy<HashMap<&'static str, &'static Map>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for map in MAPS_DATA.iter() {
        m.insert(map.map_name, map);
    }
    m
});

pub fn get_map(name: &str) -> Result<&'static Map, UnsupportedMapKind> {
    MAP_TABLE
        .get(name)
        .copied()
        .ok_or_else(|| UnsupportedMapKind(name.to_string()))
}
