//! Theme icons rendered as inline SVG markup
//!
//! Every renderer takes an optional CSS class (defaulting to
//! [`DEFAULT_ICON_CLASS`]) and returns the same vector markup with that class
//! on the root element. Strokes and fills use `currentColor` so the icons
//! follow the surrounding text color.

use crate::constants::DEFAULT_ICON_CLASS;

const SVG_OPEN: &str = r#"viewBox="0 0 24 24" fill="none" xmlns="http://www.w3.org/2000/svg">"#;

// Moon - dark theme
const MOON_BODY: &str = r#"<path d="M21 12.79A9 9 0 1 1 11.21 3 7 7 0 0 0 21 12.79z" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round" fill="currentColor" fill-opacity="0.15"/>"#;

// Sun - light theme
const SUN_BODY: &str = r#"<circle cx="12" cy="12" r="4" stroke="currentColor" stroke-width="2" fill="currentColor" fill-opacity="0.15"/><path d="M12 2v2M12 20v2M4.93 4.93l1.41 1.41M17.66 17.66l1.41 1.41M2 12h2M20 12h2M6.34 17.66l-1.41 1.41M19.07 4.93l-1.41 1.41" stroke="currentColor" stroke-width="2" stroke-linecap="round"/>"#;

// Floppy disk - auto save
const SAVE_BODY: &str = r#"<path d="M19 21H5a2 2 0 0 1-2-2V5a2 2 0 0 1 2-2h11l5 5v11a2 2 0 0 1-2 2z" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round" fill="currentColor" fill-opacity="0.1"/><path d="M17 21v-8H7v8M7 3v5h8" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"/>"#;

// Chip - current model
const CPU_BODY: &str = r#"<rect x="4" y="4" width="16" height="16" rx="2" stroke="currentColor" stroke-width="2" fill="currentColor" fill-opacity="0.1"/><rect x="9" y="9" width="6" height="6" rx="1" stroke="currentColor" stroke-width="2"/><path d="M9 1v3M15 1v3M9 20v3M15 20v3M20 9h3M20 15h3M1 9h3M1 15h3" stroke="currentColor" stroke-width="2" stroke-linecap="round"/>"#;

// Info - version label
const INFO_BODY: &str = r#"<circle cx="12" cy="12" r="10" stroke="currentColor" stroke-width="2" fill="currentColor" fill-opacity="0.1"/><path d="M12 16v-4M12 8h.01" stroke="currentColor" stroke-width="2" stroke-linecap="round"/>"#;

// External link - "get key" button
const EXTERNAL_LINK_BODY: &str = r#"<path d="M18 13v6a2 2 0 0 1-2 2H5a2 2 0 0 1-2-2V8a2 2 0 0 1 2-2h6M15 3h6v6M10 14L21 3" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"/>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Moon,
    Sun,
    Save,
    Cpu,
    Info,
    ExternalLinkSmall,
}

impl Icon {
    pub const ALL: [Icon; 6] = [
        Icon::Moon,
        Icon::Sun,
        Icon::Save,
        Icon::Cpu,
        Icon::Info,
        Icon::ExternalLinkSmall,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Icon::Moon => "moon",
            Icon::Sun => "sun",
            Icon::Save => "save",
            Icon::Cpu => "cpu",
            Icon::Info => "info",
            Icon::ExternalLinkSmall => "external-link",
        }
    }

    pub fn from_name(name: &str) -> Option<Icon> {
        Icon::ALL.into_iter().find(|icon| icon.name() == name)
    }

    fn body(self) -> &'static str {
        match self {
            Icon::Moon => MOON_BODY,
            Icon::Sun => SUN_BODY,
            Icon::Save => SAVE_BODY,
            Icon::Cpu => CPU_BODY,
            Icon::Info => INFO_BODY,
            Icon::ExternalLinkSmall => EXTERNAL_LINK_BODY,
        }
    }

    /// Render the icon markup with `class` on the root `<svg>` element.
    pub fn render(self, class: Option<&str>) -> String {
        let class = escape_attr(class.unwrap_or(DEFAULT_ICON_CLASS));
        format!(r#"<svg class="{}" {}{}</svg>"#, class, SVG_OPEN, self.body())
    }
}

pub fn moon_icon(class: Option<&str>) -> String {
    Icon::Moon.render(class)
}

pub fn sun_icon(class: Option<&str>) -> String {
    Icon::Sun.render(class)
}

pub fn save_icon(class: Option<&str>) -> String {
    Icon::Save.render(class)
}

pub fn cpu_icon(class: Option<&str>) -> String {
    Icon::Cpu.render(class)
}

pub fn info_icon(class: Option<&str>) -> String {
    Icon::Info.render(class)
}

pub fn external_link_small_icon(class: Option<&str>) -> String {
    Icon::ExternalLinkSmall.render(class)
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Rasterize an icon to a square straight-alpha RGBA buffer.
///
/// `currentColor` is resolved to `color` (any SVG color, e.g. `#e4e4e7`).
pub fn rasterize(icon: Icon, size: u32, color: &str) -> Result<Vec<u8>, String> {
    let svg = icon.render(None).replace("currentColor", color);
    let tree = resvg::usvg::Tree::from_str(&svg, &resvg::usvg::Options::default())
        .map_err(|e| e.to_string())?;
    let scale = size as f32 / tree.size().width();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size, size)
        .ok_or_else(|| format!("invalid icon size {}", size))?;
    resvg::render(
        &tree,
        resvg::usvg::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );
    Ok(premul_to_straight(&pixmap))
}

fn premul_to_straight(pixmap: &resvg::tiny_skia::Pixmap) -> Vec<u8> {
    pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let a = p.alpha();
            if a == 0 {
                [0, 0, 0, 0]
            } else {
                let r = (p.red() as u16 * 255 / a as u16) as u8;
                let g = (p.green() as u16 * 255 / a as u16) as u8;
                let b = (p.blue() as u16 * 255 / a as u16) as u8;
                [r, g, b, a]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_attr(svg: &str) -> &str {
        let start = svg.find("class=\"").unwrap() + "class=\"".len();
        let end = start + svg[start..].find('"').unwrap();
        &svg[start..end]
    }

    #[test]
    fn default_class_is_applied() {
        for icon in Icon::ALL {
            let svg = icon.render(None);
            assert_eq!(class_attr(&svg), DEFAULT_ICON_CLASS, "{}", icon.name());
        }
    }

    #[test]
    fn custom_class_replaces_default() {
        for icon in Icon::ALL {
            let svg = icon.render(Some("h-4 w-4 text-teal-400"));
            assert_eq!(class_attr(&svg), "h-4 w-4 text-teal-400");
            assert!(!svg.contains(DEFAULT_ICON_CLASS));
            assert_eq!(svg.matches("class=").count(), 1);
        }
    }

    #[test]
    fn wrappers_match_enum_rendering() {
        assert_eq!(moon_icon(None), Icon::Moon.render(None));
        assert_eq!(sun_icon(Some("x")), Icon::Sun.render(Some("x")));
        assert_eq!(save_icon(None), Icon::Save.render(None));
        assert_eq!(cpu_icon(None), Icon::Cpu.render(None));
        assert_eq!(info_icon(None), Icon::Info.render(None));
        assert_eq!(external_link_small_icon(None), Icon::ExternalLinkSmall.render(None));
    }

    #[test]
    fn class_is_attribute_escaped() {
        let svg = moon_icon(Some(r#"a" onload="x"#));
        assert!(svg.starts_with(r#"<svg class="a&quot; onload=&quot;x" "#));
    }

    #[test]
    fn names_round_trip() {
        for icon in Icon::ALL {
            assert_eq!(Icon::from_name(icon.name()), Some(icon));
        }
        assert_eq!(Icon::from_name("penguin"), None);
    }

    #[test]
    fn rasterize_produces_visible_pixels() {
        let pixels = rasterize(Icon::Sun, 32, "#ffffff").unwrap();
        assert_eq!(pixels.len(), 32 * 32 * 4);
        assert!(pixels.chunks(4).any(|p| p[3] == 255));
    }

    #[test]
    fn rasterize_rejects_zero_size() {
        assert!(rasterize(Icon::Info, 0, "#000").is_err());
    }
}
