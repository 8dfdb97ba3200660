//! KML document assembly and the color conversions the export styling needs.

const PUSHPIN_ICON: &str = "http://maps.google.com/mapfiles/kml/pushpin/ylw-pushpin.png";

/// Normalize a site hex color to six lowercase hex digits. Three-digit
/// shorthand doubles each digit; anything else falls back to `000000`.
fn normalize_hex(hex_color: &str) -> String {
    let hex = hex_color.trim_start_matches('#').to_ascii_lowercase();

    let hex = if hex.len() == 3 {
        hex.chars().flat_map(|c| [c, c]).collect()
    } else {
        hex
    };

    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        hex
    } else {
        "000000".to_string()
    }
}

/// `#RRGGBB` to KML's `aabbggrr` ordering, fully opaque.
pub fn hex_to_kml_color(hex_color: &str) -> String {
    let hex = normalize_hex(hex_color);
    format!("ff{}{}{}", &hex[4..6], &hex[2..4], &hex[0..2])
}

/// `#RRGGBB` to an `(r, g, b)` triple, for the QGIS style sidecars.
pub fn hex_to_rgb(hex_color: &str) -> (u8, u8, u8) {
    let hex = normalize_hex(hex_color);
    let channel = |range| u8::from_str_radix(&hex[range], 16).unwrap_or(0);
    (channel(0..2), channel(2..4), channel(4..6))
}

pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Accumulates placemarks and renders the final `<kml>` document. One
/// document per route; every line placemark shares the route's color.
pub struct KmlDocument {
    name: String,
    line_color: String,
    placemarks: String,
}

impl KmlDocument {
    pub fn new(name: &str, hex_color: &str) -> Self {
        KmlDocument {
            name: name.to_string(),
            line_color: hex_to_kml_color(hex_color),
            placemarks: String::new(),
        }
    }

    pub fn add_line_string(&mut self, name: &str, coordinates: &[[f64; 2]]) {
        self.placemarks.push_str(&format!(
            "    <Placemark>\n      <name>{}</name>\n      <styleUrl>#route-line</styleUrl>\n      {}\n    </Placemark>\n",
            escape_xml(name),
            line_string(coordinates),
        ));
    }

    pub fn add_multi_line_string(&mut self, name: &str, lines: &[Vec<[f64; 2]>]) {
        let mut geometry = String::from("<MultiGeometry>");
        for line in lines {
            geometry.push_str(&line_string(line));
        }
        geometry.push_str("</MultiGeometry>");

        self.placemarks.push_str(&format!(
            "    <Placemark>\n      <name>{}</name>\n      <styleUrl>#route-line</styleUrl>\n      {}\n    </Placemark>\n",
            escape_xml(name),
            geometry,
        ));
    }

    pub fn add_point(&mut self, name: &str, coordinates: [f64; 2]) {
        self.placemarks.push_str(&format!(
            "    <Placemark>\n      <name>{}</name>\n      <styleUrl>#stop-point</styleUrl>\n      <Point><coordinates>{},{}</coordinates></Point>\n    </Placemark>\n",
            escape_xml(name),
            coordinates[0],
            coordinates[1],
        ));
    }

    pub fn render(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <name>{name}</name>
    <Style id="route-line">
      <LineStyle>
        <color>{color}</color>
        <width>4</width>
      </LineStyle>
    </Style>
    <Style id="stop-point">
      <IconStyle>
        <Icon><href>{icon}</href></Icon>
      </IconStyle>
    </Style>
{placemarks}  </Document>
</kml>
"#,
            name = escape_xml(&self.name),
            color = self.line_color,
            icon = PUSHPIN_ICON,
            placemarks = self.placemarks,
        )
    }
}

/// KML wants `lon,lat` tuples separated by whitespace, the order GeoJSON
/// coordinates already come in.
fn line_string(coordinates: &[[f64; 2]]) -> String {
    let coords = coordinates
        .iter()
        .map(|c| format!("{},{}", c[0], c[1]))
        .collect::<Vec<_>>()
        .join(" ");
    format!("<LineString><coordinates>{coords}</coordinates></LineString>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kml_color_reverses_channel_order() {
        assert_eq!(hex_to_kml_color("#FF0000"), "ff0000ff");
        assert_eq!(hex_to_kml_color("#00ff00"), "ff00ff00");
        assert_eq!(hex_to_kml_color("0000ff"), "ffff0000");
    }

    #[test]
    fn three_digit_hex_expands_before_conversion() {
        assert_eq!(hex_to_kml_color("#f00"), "ff0000ff");
        assert_eq!(hex_to_kml_color("#0a0"), "ff00aa00");
    }

    #[test]
    fn invalid_hex_falls_back_to_black() {
        assert_eq!(hex_to_kml_color("#12345"), "ff000000");
        assert_eq!(hex_to_kml_color("not-a-color"), "ff000000");
        assert_eq!(hex_to_kml_color(""), "ff000000");
    }

    #[test]
    fn rgb_triple_parses_each_channel() {
        assert_eq!(hex_to_rgb("#FF8000"), (255, 128, 0));
        assert_eq!(hex_to_rgb("#fff"), (255, 255, 255));
        assert_eq!(hex_to_rgb("junk"), (0, 0, 0));
    }

    #[test]
    fn rendered_document_carries_styles_and_placemarks() {
        let mut doc = KmlDocument::new("Koridor 1 & 2", "#FF0000");
        doc.add_line_string("Segment <1>", &[[107.6, -6.9], [107.7, -6.8]]);
        doc.add_point("Alun-Alun", [107.61, -6.91]);

        let kml = doc.render();
        assert!(kml.contains("<name>Koridor 1 &amp; 2</name>"));
        assert!(kml.contains("<color>ff0000ff</color>"));
        assert!(kml.contains("<name>Segment &lt;1&gt;</name>"));
        assert!(kml.contains("<coordinates>107.6,-6.9 107.7,-6.8</coordinates>"));
        assert!(kml.contains("<Point><coordinates>107.61,-6.91</coordinates></Point>"));
    }

    #[test]
    fn multi_geometry_holds_every_part() {
        let mut doc = KmlDocument::new("r", "#000");
        doc.add_multi_line_string(
            "parts",
            &[vec![[0.0, 0.0], [1.0, 1.0]], vec![[2.0, 2.0], [3.0, 3.0]]],
        );

        let kml = doc.render();
        assert_eq!(kml.matches("<LineString>").count(), 2);
        assert!(kml.contains("<MultiGeometry>"));
    }
}
