use scholarhub_science::ProfileFacts;

/// Prompt asking for a short academic profile written from `facts`.
pub fn researcher_profile_prompt(facts: &ProfileFacts) -> String {
    let affiliation = facts
        .affiliation
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or("an academic institution");
    let areas = if facts.interests.is_empty() {
        "various research areas".to_string()
    } else {
        facts.interests.iter().take(5).cloned().collect::<Vec<_>>().join(", ")
    };

    format!(
        "Write a concise 2-3 sentence summary for researcher {name}.\n\
         \n\
         Details:\n\
         - Affiliation: {affiliation}\n\
         - h-index: {h}\n\
         - Publications: {papers}\n\
         - Research areas: {areas}\n\
         \n\
         The summary should:\n\
         - Highlight their main research contributions and expertise\n\
         - Be professional and factual\n\
         - Start with their name\n\
         - Be suitable for an academic profile\n\
         \n\
         Example format: \"[Name] is a researcher at [institution] specializing in [areas]. \
         Their work focuses on [key contributions], with [impact metric].\"",
        name = facts.name,
        h = facts.h_index,
        papers = facts.paper_count,
    )
}
