//! Sections, rendering and budget truncation of the assembled context

use super::{Source, SourceGroup};
use crate::text::truncate_at_sentence;

/// One rendered line (or line block) with its attribution
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub group: SourceGroup,
    pub text: String,
    pub score: f32,

    /// `None` for informational lines such as "no results"
    pub source: Option<Source>,
}

impl Entry {
    /// Informational line without a source
    pub fn note(group: SourceGroup, text: impl Into<String>) -> Self {
        Self {
            group,
            text: text.into(),
            score: 0.0,
            source: None,
        }
    }
}

/// Titled block of entries
#[derive(Debug, Clone)]
pub(crate) struct Section {
    pub title: String,
    pub entries: Vec<Entry>,
}

impl Section {
    pub fn new(title: impl Into<String>, entries: Vec<Entry>) -> Self {
        Self {
            title: title.into(),
            entries,
        }
    }
}

/// Render sections as `### TITLE ###` blocks; empty sections are skipped
pub(crate) fn render(sections: &[Section]) -> String {
    sections
        .iter()
        .filter(|s| !s.entries.is_empty())
        .map(render_section)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_section(section: &Section) -> String {
    let mut out = format!("### {} ###\n\n", section.title);
    for entry in &section.entries {
        out.push_str(&entry.text);
        out.push('\n');
    }
    out
}

/// Sources of the entries that survived, in rendering order
pub(crate) fn sources(sections: &[Section]) -> Vec<Source> {
    sections
        .iter()
        .flat_map(|s| &s.entries)
        .filter_map(|e| e.source.clone())
        .collect()
}

/// Drop entries until the rendered text fits `max_chars`
///
/// Entries leave in `order` of their group, lowest score first and later
/// entries first on ties. A section without entries disappears with its
/// header. When a single entry is left and still too long, it is cut at a
/// sentence boundary.
pub(crate) fn fit_to_budget(mut sections: Vec<Section>, max_chars: usize, order: &[SourceGroup]) -> Vec<Section> {
    loop {
        sections.retain(|s| !s.entries.is_empty());
        if render(&sections).chars().count() <= max_chars {
            return sections;
        }

        let remaining: usize = sections.iter().map(|s| s.entries.len()).sum();
        if remaining <= 1 {
            cut_last_entry(&mut sections, max_chars);
            return sections;
        }

        let Some((si, ei)) = next_to_drop(&sections, order) else {
            return sections;
        };
        sections[si].entries.remove(ei);
    }
}

fn next_to_drop(sections: &[Section], order: &[SourceGroup]) -> Option<(usize, usize)> {
    let rank = |group: SourceGroup| order.iter().position(|g| *g == group).unwrap_or(order.len());

    sections
        .iter()
        .enumerate()
        .flat_map(|(si, s)| s.entries.iter().enumerate().map(move |(ei, e)| (si, ei, e)))
        .min_by(|a, b| {
            rank(a.2.group)
                .cmp(&rank(b.2.group))
                .then(a.2.score.total_cmp(&b.2.score))
                .then((b.0, b.1).cmp(&(a.0, a.1)))
        })
        .map(|(si, ei, _)| (si, ei))
}

fn cut_last_entry(sections: &mut Vec<Section>, max_chars: usize) {
    let Some(section) = sections.first_mut() else {
        return;
    };
    let Some(entry) = section.entries.first_mut() else {
        return;
    };

    let text = std::mem::take(&mut entry.text);
    let overhead = render_section(section).chars().count();
    let cut = truncate_at_sentence(&text, max_chars.saturating_sub(overhead));
    if cut.is_empty() || overhead > max_chars {
        sections.clear();
    } else {
        section.entries[0].text = cut;
    }
}

/// Merge groups into one list ordered by score relative to each group's best
pub(crate) fn interleave(groups: Vec<Vec<Entry>>) -> Vec<Entry> {
    let mut merged: Vec<(f32, Entry)> = groups
        .into_iter()
        .flat_map(|group| {
            let best = group.iter().map(|e| e.score).fold(0.0_f32, f32::max);
            group.into_iter().map(move |e| {
                let relative = if best > 0.0 { e.score / best } else { 0.0 };
                (relative, e)
            })
        })
        .collect();
    merged.sort_by(|a, b| b.0.total_cmp(&a.0));
    merged.into_iter().map(|(_, e)| e).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(group: SourceGroup, text: &str, score: f32) -> Entry {
        Entry {
            group,
            text: text.to_string(),
            score,
            source: Some(Source {
                group,
                label: text.to_string(),
                score,
                preview: text.to_string(),
            }),
        }
    }

    fn sample() -> Vec<Section> {
        vec![
            Section::new("GEO", vec![
                entry(SourceGroup::Geo, "- Feuerwehr Feldkirchen", 0.9),
                entry(SourceGroup::Geo, "- Rüsthaus Glanegg", 0.4),
            ]),
            Section::new("WISSEN", vec![entry(SourceGroup::Knowledge, "Sandsäcke füllen.", 0.8)]),
            Section::new("SESSION", vec![
                entry(SourceGroup::Session, "Pegel steigt", 0.7),
                entry(SourceGroup::Session, "Strom aus", 0.2),
            ]),
        ]
    }

    #[test]
    fn test_render_skips_empty_sections() {
        let sections = vec![
            Section::new("A", vec![Entry::note(SourceGroup::Geo, "x")]),
            Section::new("B", Vec::new()),
        ];
        assert_eq!(render(&sections), "### A ###\n\nx\n");
        assert!(sources(&sections).is_empty());
    }

    #[test]
    fn test_fits_without_truncation() {
        let sections = fit_to_budget(sample(), 10_000, &[SourceGroup::Session]);
        assert_eq!(sources(&sections).len(), 5);
    }

    #[test]
    fn test_drops_session_first_lowest_score_first() {
        let full = render(&sample()).chars().count();
        let order = [SourceGroup::Session, SourceGroup::Knowledge, SourceGroup::Geo];

        let sections = fit_to_budget(sample(), full - 1, &order);
        let labels: Vec<String> = sources(&sections).into_iter().map(|s| s.label).collect();
        assert!(!labels.contains(&"Strom aus".to_string()));
        assert!(labels.contains(&"Pegel steigt".to_string()));
        assert_eq!(labels.len(), 4);
    }

    #[test]
    fn test_empty_group_loses_header() {
        let order = [SourceGroup::Session, SourceGroup::Knowledge, SourceGroup::Geo];
        let geo_and_knowledge = render(&sample()[..2]).chars().count();

        let sections = fit_to_budget(sample(), geo_and_knowledge, &order);
        let text = render(&sections);
        assert!(!text.contains("SESSION"));
        assert!(text.contains("### WISSEN ###"));
        assert!(text.chars().count() <= geo_and_knowledge);
    }

    #[test]
    fn test_sole_entry_cut_at_sentence() {
        let sections = vec![Section::new("WISSEN", vec![entry(
            SourceGroup::Knowledge,
            "Erster Satz. Zweiter Satz ist deutlich länger als erlaubt.",
            0.9,
        )])];
        let budget = "### WISSEN ###\n\n".len() + "Erster Satz.\n".len() + 5;

        let sections = fit_to_budget(sections, budget, &[]);
        assert_eq!(sections[0].entries[0].text, "Erster Satz.");
        assert!(render(&sections).chars().count() <= budget);
    }

    #[test]
    fn test_zero_budget_is_empty() {
        let sections = fit_to_budget(sample(), 0, &[SourceGroup::Session]);
        assert!(sections.is_empty());
        assert_eq!(render(&sections), "");
    }

    #[test]
    fn test_interleave_by_relative_score() {
        let merged = interleave(vec![
            vec![entry(SourceGroup::Geo, "g1", 1.0), entry(SourceGroup::Geo, "g2", 0.25)],
            vec![entry(SourceGroup::Knowledge, "k1", 0.6), entry(SourceGroup::Knowledge, "k2", 0.45)],
        ]);
        let texts: Vec<&str> = merged.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["g1", "k1", "k2", "g2"]);
    }
}
