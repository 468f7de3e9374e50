use serde::{Deserialize, Serialize};

/// Style used when the selection does not name a concrete catalog entry.
pub const FALLBACK_STYLE: &str = "photorealistic";
pub const DEFAULT_STYLE: &str = "Photorealistic";

const BUILTIN: &[(&str, &[&str])] = &[
    (
        "Photographic & Realistic",
        &[
            "Photorealistic",
            "Cinematic Film Still",
            "Analog Film (35mm / Kodak / Fujifilm)",
            "Film Noir",
            "Portrait Photography",
            "Food Photography",
            "Macro Photography",
            "Street Photography",
            "Old Photograph BW",
            "Old Photograph Colorized",
        ],
    ),
    (
        "Artistic & Painting",
        &[
            "Oil Painting",
            "Watercolor",
            "BW Pencil Sketch",
            "Color Pencil Sketch",
            "BW Charcoal Drawing",
            "Color Charcoal Drawing",
            "Digital Painting",
            "Surrealism",
            "Impressionism",
        ],
    ),
    (
        "Graphic & Stylized",
        &[
            "Illustration",
            "Anime",
            "Comic Book",
            "Graphic Novel",
            "Pixel Art",
            "Vector Graphics",
            "Flat Design",
        ],
    ),
    (
        "3D & Rendering",
        &[
            "3D Rendering",
            "Octane Render / Unreal Engine",
            "Lowpoly",
            "Isometric",
            "Blender Render",
        ],
    ),
    (
        "Genre & Aesthetic",
        &[
            "Cyberpunk",
            "Neonpunk",
            "Steampunk",
            "Fantasy",
            "Sci-Fi",
            "Art Deco",
            "Art Nouveau",
            "Minimalist",
            "Vintage / Retro",
            "Concept Art",
        ],
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleCategory {
    pub name: String,
    pub styles: Vec<String>,
}

/// Ordered categories of named styles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleCatalog {
    categories: Vec<StyleCategory>,
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StyleCatalog {
    pub fn builtin() -> Self {
        let categories = BUILTIN
            .iter()
            .map(|(name, styles)| StyleCategory {
                name: (*name).to_string(),
                styles: styles.iter().map(|s| (*s).to_string()).collect(),
            })
            .collect();
        Self { categories }
    }

    pub fn new(categories: Vec<StyleCategory>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[StyleCategory] {
        &self.categories
    }

    /// All style names in display order, categories flattened.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .flat_map(|c| c.styles.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.categories.iter().map(|c| c.styles.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Case-insensitive lookup; returns the catalog's spelling.
    pub fn find(&self, name: &str) -> Option<&str> {
        let needle = name.trim();
        self.iter().find(|s| s.eq_ignore_ascii_case(needle))
    }

    /// 1-based position in the flattened catalog.
    pub fn by_number(&self, n: usize) -> Option<&str> {
        n.checked_sub(1).and_then(|i| self.iter().nth(i))
    }

    /// Accepts `custom`, a 1-based number, or a style name.
    pub fn parse_selection(&self, input: &str) -> Option<StyleSelection> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("custom") {
            return Some(StyleSelection::Custom);
        }
        if let Ok(n) = input.parse::<usize>() {
            return self
                .by_number(n)
                .map(|s| StyleSelection::Catalog(s.to_string()));
        }
        self.find(input)
            .map(|s| StyleSelection::Catalog(s.to_string()))
    }

    pub fn default_selection(&self, preferred: &str) -> StyleSelection {
        match self.find(preferred) {
            Some(s) => StyleSelection::Catalog(s.to_string()),
            None => StyleSelection::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleSelection {
    Catalog(String),
    Custom,
    None,
}

/// Free-text custom style wins over the selection; anything that is not a
/// catalog style falls back to [`FALLBACK_STYLE`].
pub fn resolve_style(selection: &StyleSelection, custom: &str) -> String {
    let custom = custom.trim();
    if !custom.is_empty() {
        return custom.to_string();
    }
    match selection {
        StyleSelection::Catalog(s) => s.clone(),
        StyleSelection::Custom | StyleSelection::None => FALLBACK_STYLE.to_string(),
    }
}
