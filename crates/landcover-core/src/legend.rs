//! Class colors, display names and legend rules.
//!
//! One [`ClassTable`] is loaded per process and shared by reference with the
//! renderer, the legend and the stats views, so colors and labels cannot
//! drift between them.
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::raster::{ClassId, NO_DATA};

/// An opaque RGB color, serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    pub fn to_rgba(self, alpha: u8) -> [u8; 4] {
        let [r, g, b] = self.0;
        [r, g, b, alpha]
    }
}

impl FromStr for Rgb {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ConfigError::Color(s.to_string()));
        }
        let packed = u32::from_str_radix(hex, 16).map_err(|_| ConfigError::Color(s.to_string()))?;
        Ok(Rgb([(packed >> 16) as u8, (packed >> 8) as u8, packed as u8]))
    }
}

impl TryFrom<String> for Rgb {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

// ── Class table ───────────────────────────────────────────────────────────────

/// Display configuration for one land-cover class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub id: ClassId,
    pub name: String,
    pub color: Rgb,
    /// Show this class in the legend only for these years. `None` = always.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_years: Option<Vec<i32>>,
}

impl ClassInfo {
    pub fn new(id: ClassId, name: &str, color: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            id,
            name: name.to_string(),
            color: color.parse()?,
            only_years: None,
        })
    }

    pub fn shown_in(&self, year: i32) -> bool {
        self.only_years.as_ref().map_or(true, |ys| ys.contains(&year))
    }
}

#[derive(Deserialize)]
struct ClassTableDef {
    classes: Vec<ClassInfo>,
    #[serde(default = "default_fallback")]
    fallback_color: Rgb,
}

fn default_fallback() -> Rgb {
    Rgb::BLACK
}

/// ClassId → color/name table, sorted by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassTable {
    classes: Vec<ClassInfo>,
    fallback_color: Rgb,
}

impl<'de> Deserialize<'de> for ClassTable {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let def = ClassTableDef::deserialize(d)?;
        Self::new(def.classes, def.fallback_color).map_err(serde::de::Error::custom)
    }
}

impl ClassTable {
    /// Build a table. Ids must be unique and non-zero (0 is always no-data).
    pub fn new(mut classes: Vec<ClassInfo>, fallback_color: Rgb) -> Result<Self, ConfigError> {
        classes.sort_by_key(|c| c.id);
        if classes.first().is_some_and(|c| c.id == NO_DATA) {
            return Err(ConfigError::Invalid("class id 0 is reserved for no data".into()));
        }
        if let Some(dup) = classes.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(ConfigError::Invalid(format!("duplicate class id {}", dup[0].id)));
        }
        Ok(Self { classes, fallback_color })
    }

    /// The mangrove & creek rehabilitation classes.
    pub fn mangrove() -> Self {
        let info = |id, name: &str, color| ClassInfo {
            id,
            name: name.to_string(),
            color: Rgb(color),
            only_years: None,
        };
        Self {
            classes: vec![
                info(1, "Mangrove Forest", [0x2c, 0xa0, 0x2c]),
                info(2, "Bare Land", [0x8c, 0x56, 0x4b]),
                info(3, "Water", [0x1f, 0x77, 0xb4]),
                ClassInfo {
                    only_years: Some(vec![2022, 2025]),
                    ..info(4, "Prosopis", [0xd6, 0x27, 0x28])
                },
            ],
            fallback_color: Rgb::BLACK,
        }
    }

    pub fn classes(&self) -> &[ClassInfo] {
        &self.classes
    }

    pub fn fallback_color(&self) -> Rgb {
        self.fallback_color
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassInfo> {
        self.classes
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &self.classes[i])
    }

    /// Display name, `Class N` for ids missing from the table.
    pub fn label(&self, id: ClassId) -> Cow<'_, str> {
        match self.get(id) {
            Some(c) => Cow::Borrowed(c.name.as_str()),
            None => Cow::Owned(format!("Class {id}")),
        }
    }

    pub fn color(&self, id: ClassId) -> Rgb {
        self.get(id).map_or(self.fallback_color, |c| c.color)
    }

    /// Precomputed RGBA lookup for the renderer.
    pub fn color_lut(&self) -> ColorLut {
        ColorLut::new(self)
    }

    /// Legend rows for `year`, in class order.
    pub fn legend_entries(&self, year: i32) -> Vec<LegendEntry> {
        self.classes
            .iter()
            .filter(|c| c.shown_in(year))
            .map(|c| LegendEntry {
                class_id: c.id,
                label: c.name.clone(),
                color: c.color,
            })
            .collect()
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::mangrove()
    }
}

/// One row of the map legend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub class_id: ClassId,
    pub label: String,
    pub color: Rgb,
}

// ── Color lookup ──────────────────────────────────────────────────────────────

/// Dense ClassId → RGBA table. Index 0 is fully transparent; ids past the
/// end of the table resolve to the opaque fallback color.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorLut {
    table: Vec<[u8; 4]>,
    fallback: [u8; 4],
}

impl ColorLut {
    pub fn new(classes: &ClassTable) -> Self {
        let fallback = classes.fallback_color.to_rgba(u8::MAX);
        let len = classes.classes.last().map_or(1, |c| usize::from(c.id) + 1);
        let mut table = vec![fallback; len];
        for c in &classes.classes {
            table[usize::from(c.id)] = c.color.to_rgba(u8::MAX);
        }
        table[usize::from(NO_DATA)] = [0, 0, 0, 0];
        Self { table, fallback }
    }

    #[inline]
    pub fn rgba(&self, id: ClassId) -> [u8; 4] {
        self.table.get(usize::from(id)).copied().unwrap_or(self.fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_roundtrip_through_display() {
        let c: Rgb = "#2ca02c".parse().unwrap();
        assert_eq!(c, Rgb([0x2c, 0xa0, 0x2c]));
        assert_eq!(c.to_string(), "#2ca02c");
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#zzzzzz".parse::<Rgb>().is_err());
    }

    #[test]
    fn unknown_class_gets_generic_label_and_fallback_color() {
        let t = ClassTable::mangrove();
        assert_eq!(t.label(3), "Water");
        assert_eq!(t.label(9), "Class 9");
        assert_eq!(t.color(9), Rgb::BLACK);
    }

    #[test]
    fn prosopis_only_in_later_years() {
        let t = ClassTable::mangrove();
        let ids = |year| t.legend_entries(year).iter().map(|e| e.class_id).collect::<Vec<_>>();
        assert_eq!(ids(2007), vec![1, 2, 3]);
        assert_eq!(ids(2022), vec![1, 2, 3, 4]);
        assert_eq!(ids(2025), vec![1, 2, 3, 4]);
    }

    #[test]
    fn lut_is_transparent_only_for_no_data() {
        let lut = ClassTable::mangrove().color_lut();
        assert_eq!(lut.rgba(0), [0, 0, 0, 0]);
        assert_eq!(lut.rgba(1), [0x2c, 0xa0, 0x2c, 255]);
        assert_eq!(lut.rgba(500), [0, 0, 0, 255]);
    }

    #[test]
    fn table_from_json_sorts_and_validates() {
        let json = r##"{"classes":[
            {"id":2,"name":"B","color":"#00ff00"},
            {"id":1,"name":"A","color":"#ff0000","only_years":[2020]}
        ],"fallback_color":"#808080"}"##;
        let t: ClassTable = serde_json::from_str(json).unwrap();
        assert_eq!(t.classes()[0].id, 1);
        assert_eq!(t.fallback_color(), Rgb([0x80, 0x80, 0x80]));
        assert!(t.legend_entries(2019).iter().all(|e| e.class_id != 1));

        let dup = r##"{"classes":[{"id":1,"name":"A","color":"#ff0000"},{"id":1,"name":"B","color":"#00ff00"}]}"##;
        assert!(serde_json::from_str::<ClassTable>(dup).is_err());

        let zero = r##"{"classes":[{"id":0,"name":"A","color":"#ff0000"}]}"##;
        assert!(serde_json::from_str::<ClassTable>(zero).is_err());
    }
}
