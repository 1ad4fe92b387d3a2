//! Maven POM generation.

use std::fmt::Write;

use super::PublicationMetadata;

/// Escape text for use inside an XML element.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn element(out: &mut String, indent: usize, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let _ = writeln!(
        out,
        "{:indent$}<{name}>{}</{name}>",
        "",
        xml_escape(value),
        indent = indent,
        name = name
    );
}

/// Render the POM for an AAR publication.
pub fn render(meta: &PublicationMetadata) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(
        "<project xmlns=\"http://maven.apache.org/POM/4.0.0\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xsi:schemaLocation=\"http://maven.apache.org/POM/4.0.0 \
         https://maven.apache.org/xsd/maven-4.0.0.xsd\">\n",
    );
    element(&mut out, 2, "modelVersion", "4.0.0");
    element(&mut out, 2, "groupId", &meta.group);
    element(&mut out, 2, "artifactId", &meta.name);
    element(&mut out, 2, "version", &meta.version);
    element(&mut out, 2, "packaging", "aar");
    element(&mut out, 2, "name", &meta.name);
    element(&mut out, 2, "description", &meta.description);
    element(&mut out, 2, "url", &meta.url);

    if !meta.licenses.is_empty() {
        out.push_str("  <licenses>\n");
        for license in &meta.licenses {
            out.push_str("    <license>\n");
            element(&mut out, 6, "name", &license.name);
            element(&mut out, 6, "url", &license.url);
            element(&mut out, 6, "distribution", &license.distribution);
            out.push_str("    </license>\n");
        }
        out.push_str("  </licenses>\n");
    }

    if !meta.developers.is_empty() {
        out.push_str("  <developers>\n");
        for developer in &meta.developers {
            out.push_str("    <developer>\n");
            element(&mut out, 6, "name", developer);
            out.push_str("    </developer>\n");
        }
        out.push_str("  </developers>\n");
    }

    if !meta.scm_url.is_empty() || !meta.scm_connection.is_empty() {
        out.push_str("  <scm>\n");
        element(&mut out, 4, "connection", &meta.scm_connection);
        element(&mut out, 4, "url", &meta.scm_url);
        out.push_str("  </scm>\n");
    }

    if !meta.dependencies.is_empty() {
        out.push_str("  <dependencies>\n");
        for (name, version) in &meta.dependencies {
            out.push_str("    <dependency>\n");
            element(&mut out, 6, "groupId", &meta.dependency_group);
            element(&mut out, 6, "artifactId", name);
            element(&mut out, 6, "version", version);
            element(&mut out, 6, "type", "aar");
            element(&mut out, 6, "scope", "runtime");
            out.push_str("    </dependency>\n");
        }
        out.push_str("  </dependencies>\n");
    }

    out.push_str("</project>\n");
    out
}
