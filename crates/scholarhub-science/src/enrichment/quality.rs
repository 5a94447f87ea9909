use scholarhub_core::ResearcherEntity;

fn present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Completeness score in `0..=100`. Depends only on the entity's fields.
pub fn quality_score(r: &ResearcherEntity) -> u8 {
    let ids = &r.external_ids;
    let m = &r.metrics;
    let points: [(bool, u32); 15] = [
        (present(ids.orcid.as_deref()), 15),
        (present(ids.semantic_scholar.as_deref()), 10),
        (present(ids.openalex.as_deref()), 10),
        (present(r.affiliation.as_deref()), 5),
        (m.h_index > 0, 5),
        (m.paper_count > 0, 5),
        (m.total_citations > 0, 5),
        (m.i10_index > 0, 5),
        (!r.research_interests.is_empty(), 10),
        (!r.research_concepts.is_empty(), 5),
        (present(r.primary_research_area.as_deref()), 5),
        (present(r.summary.as_deref()), 5),
        (present(r.url.as_deref()), 5),
        (!r.affiliation_history.is_empty(), 5),
        (present(r.current_position.as_deref()), 5),
    ];
    let total: u32 = points.iter().filter(|(hit, _)| *hit).map(|(_, p)| p).sum();
    total.min(100) as u8
}
