//! Serialization of context packs into markdown, JSON and XML.

use crate::config::OutputFormat;
use crate::errors::CodesightResult;
use crate::models::{ContextPack, InclusionMode};

fn list_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

fn fence_language(mode: InclusionMode) -> &'static str {
    match mode {
        InclusionMode::FullSource => "python",
        InclusionMode::Outline => "text",
    }
}

pub fn to_markdown(pack: &ContextPack) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("# AI Context Pack: {}", pack.task));
    lines.push(String::new());

    let analysis = &pack.task_analysis;
    lines.push("## Task Analysis".to_string());
    lines.push(String::new());
    lines.push(format!("- **Type**: {}", analysis.task_type));
    lines.push(format!("- **Keywords**: {}", list_or(&analysis.keywords, "none")));
    lines.push(format!("- **Domain**: {}", list_or(&analysis.domain_concepts, "general")));
    lines.push(format!("- **Strategy**: {}", pack.strategy));
    lines.push(String::new());

    lines.push("## Token Budget".to_string());
    lines.push(String::new());
    lines.push(format!("- Max: {}", pack.budget));
    lines.push(format!("- Used: {}", pack.used));
    lines.push(format!("- Remaining: {}", pack.remaining()));
    lines.push(String::new());

    lines.push("## Relevant Files".to_string());
    lines.push(String::new());
    for entry in &pack.entries {
        lines.push(format!("### {}", entry.path));
        lines.push(String::new());
        lines.push(format!(
            "**Relevance**: {:.2} | **Lines**: {} | **Reason**: {}",
            entry.score, entry.lines, entry.reason
        ));
        lines.push(String::new());
        lines.push(format!("```{}", fence_language(entry.included_as)));
        lines.push(entry.content.clone());
        lines.push("```".to_string());
        lines.push(String::new());
    }

    for section in &pack.sections {
        lines.push(format!("## {}", section.title));
        lines.push(String::new());
        lines.extend(section.body.lines().map(|l| format!("- {l}")));
        lines.push(String::new());
    }

    if !pack.related_tests.is_empty() {
        lines.push("## Related Tests".to_string());
        lines.push(String::new());
        lines.extend(pack.related_tests.iter().map(|t| format!("- {t}")));
        lines.push(String::new());
    }

    if !pack.suggestions.is_empty() {
        lines.push("## Suggestions".to_string());
        lines.push(String::new());
        lines.extend(pack.suggestions.iter().map(|s| format!("- {s}")));
        lines.push(String::new());
    }

    if !pack.notes.is_empty() {
        lines.push("## Notes".to_string());
        lines.push(String::new());
        lines.extend(pack.notes.iter().map(|n| format!("- {n}")));
        lines.push(String::new());
    }

    lines.join("\n")
}

pub fn to_json(pack: &ContextPack) -> CodesightResult<String> {
    Ok(serde_json::to_string_pretty(pack)?)
}

/// Escape text for use inside an XML attribute or element.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Wrap text in CDATA, splitting any embedded terminator.
pub fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

pub fn to_xml(pack: &ContextPack) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(r#"<?xml version="1.0" encoding="UTF-8"?>"#.to_string());
    lines.push(format!(r#"<contextPack task="{}">"#, escape_xml(&pack.task)));
    lines.push(format!("  <strategy>{}</strategy>", escape_xml(&pack.strategy)));
    lines.push(format!(
        r#"  <tokenBudget max="{}" used="{}" remaining="{}" />"#,
        pack.budget,
        pack.used,
        pack.remaining()
    ));

    let analysis = &pack.task_analysis;
    lines.push(format!(r#"  <taskAnalysis type="{}">"#, escape_xml(&analysis.task_type)));
    for keyword in &analysis.keywords {
        lines.push(format!("    <keyword>{}</keyword>", escape_xml(keyword)));
    }
    for domain in &analysis.domain_concepts {
        lines.push(format!("    <domain>{}</domain>", escape_xml(domain)));
    }
    lines.push("  </taskAnalysis>".to_string());

    lines.push("  <files>".to_string());
    for entry in &pack.entries {
        let mode = match entry.included_as {
            InclusionMode::FullSource => "full_source",
            InclusionMode::Outline => "outline",
        };
        lines.push(format!(
            r#"    <file path="{}" relevance="{:.2}" lines="{}" reason="{}" includedAs="{mode}">"#,
            escape_xml(&entry.path),
            entry.score,
            entry.lines,
            escape_xml(&entry.reason)
        ));
        lines.push(format!("      <content>{}</content>", cdata(&entry.content)));
        lines.push("    </file>".to_string());
    }
    lines.push("  </files>".to_string());

    for section in &pack.sections {
        lines.push(format!(
            r#"  <section title="{}">{}</section>"#,
            escape_xml(&section.title),
            cdata(&section.body)
        ));
    }
    if !pack.related_tests.is_empty() {
        lines.push("  <relatedTests>".to_string());
        for test in &pack.related_tests {
            lines.push(format!("    <test>{}</test>", escape_xml(test)));
        }
        lines.push("  </relatedTests>".to_string());
    }
    for suggestion in &pack.suggestions {
        lines.push(format!("  <suggestion>{}</suggestion>", escape_xml(suggestion)));
    }
    for note in &pack.notes {
        lines.push(format!("  <note>{}</note>", escape_xml(note)));
    }
    lines.push("</contextPack>".to_string());
    lines.join("\n")
}

/// Render `pack` in the requested format.
pub fn render_context(pack: &ContextPack, format: OutputFormat) -> CodesightResult<String> {
    match format {
        OutputFormat::Markdown => Ok(to_markdown(pack)),
        OutputFormat::Json => to_json(pack),
        OutputFormat::Xml => Ok(to_xml(pack)),
    }
}
