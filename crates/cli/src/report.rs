use boardlens_engine::{Evaluation, PassOutcome, PassReport};

pub fn render_report(report: &PassReport) -> String {
    let mut out = String::new();
    if report.outcome == PassOutcome::BoardNotReady {
        out.push_str("Board not ready: no visible cards\n");
        return out;
    }

    out.push_str(&format!("Columns ({}):\n", report.columns.len()));
    for column in &report.columns {
        out.push_str(&format!(
            "  {:<10} {:<24} {} cards\n",
            column.id, column.name, column.card_count
        ));
    }

    out.push_str(&format!("Owners ({}):\n", report.owners.len()));
    for owner in &report.owners {
        out.push_str(&format!(
            "  {:<24} {:<24} {}\n",
            owner.id, owner.name, owner.color
        ));
    }

    render_evaluations(&mut out, "Owner limits", &report.owner_limits);
    render_evaluations(&mut out, "Group limits", &report.group_limits);

    if !report.workload.is_empty() {
        out.push_str("Workload:\n");
        for entry in &report.workload {
            out.push_str(&format!(
                "  {:<24} {} in progress{}\n",
                entry.owner_id,
                entry.in_progress,
                if entry.overloaded { "  OVERLOADED" } else { "" }
            ));
        }
    }

    let stats = &report.annotations;
    out.push_str(&format!(
        "Annotations: {} badges, {} decorated columns, {} group headers, {} highlighted cards\n",
        stats.badges, stats.decorated_columns, stats.group_headers, stats.highlighted_cards
    ));
    for failure in &stats.failures {
        out.push_str(&format!("  failed: {failure}\n"));
    }
    out
}

fn render_evaluations(out: &mut String, title: &str, evaluations: &[Evaluation]) {
    if evaluations.is_empty() {
        return;
    }
    out.push_str(&format!("{title}:\n"));
    for eval in evaluations {
        out.push_str(&format!(
            "  {:<16} {}/{}{}\n",
            eval.limit_id,
            eval.current_count,
            eval.limit,
            if eval.exceeded { "  EXCEEDED" } else { "" }
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardlens_engine::fixture::{BoardFixture, CardOwner};
    use boardlens_engine::{BoardEngine, EngineConfig};
    use boardlens_protocol::BoardSettings;

    #[test]
    fn renders_columns_and_owners() {
        let mut doc = BoardFixture::new()
            .column(Some("To Do"))
            .card("K-1", 10.0, CardOwner::named("Alice"))
            .document();
        let mut engine = BoardEngine::new(EngineConfig::default()).unwrap();
        let report = engine.run_pass(&mut doc, &BoardSettings::default());

        let text = render_report(&report);
        assert!(text.starts_with("Columns (1):\n"));
        assert!(text.contains("Alice"));
        assert!(!text.contains("Owner limits"));
    }

    #[test]
    fn not_ready_board_is_one_line() {
        let mut doc = BoardFixture::new().document();
        let mut engine = BoardEngine::new(EngineConfig::default()).unwrap();
        let report = engine.run_pass(&mut doc, &BoardSettings::default());
        assert_eq!(render_report(&report), "Board not ready: no visible cards\n");
    }
}
