//! Human-readable and JSON rendering of a security analysis result.

use std::collections::HashSet;
use std::io::Write;

use anyhow::Result;
use gridsec_algo::{
    LimitViolation, LimitViolationKey, LimitViolationType, PostContingencyComputationStatus,
    SecurityAnalysisResult,
};
use gridsec_core::Network;
use tabwriter::TabWriter;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    /// Hide post-contingency violations that already exist in the base case
    pub skip_pre_violations: bool,
}

const HEADER: &str = "Equipment\tEnd\tCountry\tBase voltage\tViolation type\tViolation name\tValue\tLimit\tabs(value-limit)\tLoading rate %";

/// Display name of the limit that was crossed.
pub fn violation_name(violation: &LimitViolation) -> String {
    if let Some(name) = violation.limit_name() {
        return name.to_string();
    }
    if violation.limit_type() != LimitViolationType::Current {
        return String::new();
    }
    if violation.is_permanent() {
        "Permanent limit".to_string()
    } else {
        format!("Overload {}'", violation.acceptable_duration() / 60)
    }
}

fn violation_cells(violation: &LimitViolation, network: &Network) -> String {
    let voltage_level = network
        .locatable(violation.subject_id())
        .and_then(|element| element.voltage_level(network, violation.side()));
    let end = voltage_level.map(|vl| vl.id.as_str()).unwrap_or("");
    let country = voltage_level
        .and_then(|vl| network.country(vl))
        .map(|c| c.code().to_string())
        .unwrap_or_default();
    let base_voltage = voltage_level
        .map(|vl| format!("{:.0}", vl.nominal_v.0))
        .unwrap_or_default();
    let loading_rate = if violation.limit_type() == LimitViolationType::Current {
        format!("{:.2}", violation.loading_rate())
    } else {
        String::new()
    };
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{:.4}\t{:.4}\t{:.4}\t{}",
        violation.subject_id(),
        end,
        country,
        base_voltage,
        violation.limit_type(),
        violation_name(violation),
        violation.value(),
        violation.limit(),
        (violation.value() - violation.limit()).abs(),
        loading_rate,
    )
}

fn sorted(violations: &[LimitViolation]) -> Vec<&LimitViolation> {
    let mut rows: Vec<&LimitViolation> = violations.iter().collect();
    rows.sort_by(|a, b| {
        a.subject_id()
            .cmp(b.subject_id())
            .then_with(|| a.limit_type().cmp(&b.limit_type()))
            .then_with(|| a.side().cmp(&b.side()))
    });
    rows
}

/// Tab-aligned tables: base case first, then every contingency that has
/// violations or did not converge.
pub fn write_ascii<W: Write>(
    writer: W,
    result: &SecurityAnalysisResult,
    network: &Network,
    options: &ReportOptions,
) -> Result<()> {
    let mut out = TabWriter::new(writer);
    let pre = &result.pre_contingency_result;

    if result.is_failed() {
        writeln!(out, "Pre-contingency state: computation failed ({:?})", pre.status)?;
        out.flush()?;
        return Ok(());
    }

    let pre_violations = &pre.limit_violations_result.limit_violations;
    writeln!(out, "Pre-contingency violations: {}", pre_violations.len())?;
    if !pre_violations.is_empty() {
        writeln!(out, "{HEADER}")?;
        for violation in sorted(pre_violations) {
            writeln!(out, "{}", violation_cells(violation, network))?;
        }
    }
    writeln!(out)?;

    let known: HashSet<LimitViolationKey> = if options.skip_pre_violations {
        pre_violations.iter().map(LimitViolation::key).collect()
    } else {
        HashSet::new()
    };

    let mut posts: Vec<_> = result.post_contingency_results.iter().collect();
    posts.sort_by(|a, b| a.contingency_id.cmp(&b.contingency_id));

    let rows: Vec<_> = posts
        .into_iter()
        .map(|post| {
            let violations: Vec<&LimitViolation> =
                sorted(&post.limit_violations_result.limit_violations)
                    .into_iter()
                    .filter(|v| !known.contains(&v.key()))
                    .collect();
            (post, violations)
        })
        .filter(|(post, violations)| {
            !violations.is_empty() || post.status != PostContingencyComputationStatus::Converged
        })
        .collect();

    writeln!(
        out,
        "Post-contingency results: {} of {} contingencies to report",
        rows.len(),
        result.post_contingency_results.len()
    )?;
    if !rows.is_empty() {
        writeln!(out, "Contingency\tStatus\t{HEADER}")?;
        for (post, violations) in rows {
            if violations.is_empty() {
                writeln!(out, "{}\t{}", post.contingency_id, post.status)?;
            }
            for violation in violations {
                writeln!(
                    out,
                    "{}\t{}\t{}",
                    post.contingency_id,
                    post.status,
                    violation_cells(violation, network)
                )?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(mut writer: W, result: &SecurityAnalysisResult) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, result)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsec_algo::test_utils::triangle_network;
    use gridsec_algo::{
        LimitViolationsResult, LoadFlowStatus, PostContingencyResult, PreContingencyResult,
    };
    use gridsec_core::TwoSides;

    fn current(duration: Option<u32>, value: f64) -> LimitViolation {
        let builder = LimitViolation::builder("L12", LimitViolationType::Current)
            .limit(500.0)
            .value(value)
            .side(TwoSides::One);
        match duration {
            Some(seconds) => builder.acceptable_duration(seconds),
            None => builder,
        }
        .build()
        .unwrap()
    }

    fn result(pre: Vec<LimitViolation>, posts: Vec<PostContingencyResult>) -> SecurityAnalysisResult {
        SecurityAnalysisResult {
            network_metadata: None,
            pre_contingency_result: PreContingencyResult {
                status: LoadFlowStatus::Converged,
                limit_violations_result: LimitViolationsResult::new(true, pre),
                network_result: Default::default(),
            },
            post_contingency_results: posts,
        }
    }

    fn post(id: &str, status: PostContingencyComputationStatus, violations: Vec<LimitViolation>) -> PostContingencyResult {
        PostContingencyResult {
            contingency_id: id.to_string(),
            status,
            limit_violations_result: LimitViolationsResult::new(true, violations),
            network_result: Default::default(),
        }
    }

    fn render(result: &SecurityAnalysisResult, options: ReportOptions) -> String {
        let mut buffer = Vec::new();
        write_ascii(&mut buffer, result, &triangle_network().unwrap(), &options).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn names_follow_the_limit() {
        assert_eq!(violation_name(&current(None, 550.0)), "Permanent limit");
        assert_eq!(violation_name(&current(Some(600), 750.0)), "Overload 10'");
        let low = LimitViolation::builder("VL1", LimitViolationType::LowVoltage)
            .limit(380.0)
            .value(370.0)
            .build()
            .unwrap();
        assert_eq!(violation_name(&low), "");
    }

    #[test]
    fn rows_carry_location_and_loading() {
        let text = render(&result(vec![current(None, 550.0)], vec![]), ReportOptions::default());
        assert!(text.contains("Pre-contingency violations: 1"));
        let row = text.lines().find(|l| l.starts_with("L12")).unwrap();
        assert!(row.contains("VL1"));
        assert!(row.contains("FR"));
        assert!(row.contains("400"));
        assert!(row.contains("110.00"));
        assert!(row.contains("Permanent limit"));
    }

    #[test]
    fn quiet_contingencies_are_left_out() {
        let text = render(
            &result(
                vec![],
                vec![
                    post("C2", PostContingencyComputationStatus::Converged, vec![]),
                    post("C3", PostContingencyComputationStatus::Failed, vec![]),
                    post("C1", PostContingencyComputationStatus::Converged, vec![current(Some(600), 750.0)]),
                ],
            ),
            ReportOptions::default(),
        );
        assert!(text.contains("2 of 3 contingencies"));
        assert!(!text.contains("C2"));
        let c1 = text.find("C1").unwrap();
        let c3 = text.find("C3").unwrap();
        assert!(c1 < c3);
        assert!(text.contains("FAILED"));
    }

    #[test]
    fn base_case_violations_can_be_skipped() {
        let base = current(None, 550.0);
        let res = result(
            vec![base.clone()],
            vec![post("C1", PostContingencyComputationStatus::Converged, vec![base])],
        );
        let shown = render(&res, ReportOptions::default());
        assert!(shown.contains("1 of 1 contingencies"));
        let skipped = render(&res, ReportOptions { skip_pre_violations: true });
        assert!(skipped.contains("0 of 1 contingencies"));
    }

    #[test]
    fn failed_base_case_is_reported() {
        let text = render(&SecurityAnalysisResult::failed(), ReportOptions::default());
        assert!(text.contains("computation failed"));
    }

    #[test]
    fn json_output_parses_back() {
        let res = result(vec![current(None, 550.0)], vec![]);
        let mut buffer = Vec::new();
        write_json(&mut buffer, &res).unwrap();
        let parsed: SecurityAnalysisResult = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed, res);
    }
}
