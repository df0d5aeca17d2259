//! Aggregation and text output for calculated production chains

use std::collections::BTreeMap;
use std::fmt;

use crate::models::{ChainNode, Mode};

/// Totals over a whole production chain
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSummary {
    pub target_good: String,
    pub target_rate: f64,
    pub mode: Mode,
    pub total_facilities: f64,
    pub total_workforce: f64,
    pub workforce_by_kind: BTreeMap<String, f64>,
    pub facility_counts: BTreeMap<String, f64>,
    pub raw_inputs: BTreeMap<String, f64>,
    pub errors: Vec<String>,
}

/// Generate a summary of the production chain
pub fn summarize_chain(node: &ChainNode, target_good: &str, target_rate: f64, mode: Mode) -> ChainSummary {
    let mut summary = ChainSummary {
        target_good: target_good.to_string(),
        target_rate,
        mode,
        total_facilities: 0.0,
        total_workforce: 0.0,
        workforce_by_kind: BTreeMap::new(),
        facility_counts: BTreeMap::new(),
        raw_inputs: BTreeMap::new(),
        errors: Vec::new(),
    };
    collect_summary(node, &mut summary);
    summary
}

fn collect_summary(node: &ChainNode, summary: &mut ChainSummary) {
    let node = match node {
        ChainNode::Failed(err) => {
            summary.errors.push(err.to_string());
            return;
        }
        ChainNode::Resolved(node) => node,
    };

    if node.is_raw {
        *summary.raw_inputs.entry(node.good.clone()).or_default() += node.target_rate;
        return;
    }

    if let Some(usage) = &node.facility {
        summary.total_facilities += node.facility_count;
        summary.total_workforce += usage.total_workforce;
        *summary
            .facility_counts
            .entry(usage.facility_name.clone())
            .or_default() += node.facility_count;
        if !usage.workforce_kind.is_empty() && usage.total_workforce > 0.0 {
            *summary
                .workforce_by_kind
                .entry(usage.workforce_kind.clone())
                .or_default() += usage.total_workforce;
        }
    }

    for sub_chain in node.sub_chains.values() {
        collect_summary(sub_chain, summary);
    }
}

impl fmt::Display for ChainSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Production Summary ({}) ===", self.mode)?;
        writeln!(f, "Target: {} @ {:.2} t/min", self.target_good, self.target_rate)?;
        writeln!(f)?;

        writeln!(f, "Buildings required:")?;
        for (name, count) in &self.facility_counts {
            writeln!(f, "  {:.2}x {}", count, name)?;
        }
        writeln!(f, "  Total: {:.2}", self.total_facilities)?;
        writeln!(f)?;

        writeln!(f, "Raw inputs required:")?;
        for (name, rate) in &self.raw_inputs {
            writeln!(f, "  {} @ {:.2} t/min", name, rate)?;
        }
        writeln!(f)?;

        writeln!(f, "Workforce:")?;
        for (kind, count) in &self.workforce_by_kind {
            writeln!(f, "  {:.0} {}", count, kind)?;
        }
        writeln!(f, "  Total: {:.0}", self.total_workforce)?;

        if !self.errors.is_empty() {
            writeln!(f)?;
            writeln!(f, "Errors:")?;
            for err in &self.errors {
                writeln!(f, "  {}", err)?;
            }
        }

        Ok(())
    }
}

/// Base scenario against optimized scenario for the same target
#[derive(Debug, Clone, PartialEq)]
pub struct ChainComparison {
    pub base: ChainSummary,
    pub optimized: ChainSummary,
}

pub fn compare_chains(base: ChainSummary, optimized: ChainSummary) -> ChainComparison {
    ChainComparison { base, optimized }
}

/// Percentage of `base` saved by going down to `optimized`; 0 when base is 0
fn reduction_percent(base: f64, optimized: f64) -> f64 {
    if base > 0.0 {
        (base - optimized) / base * 100.0
    } else {
        0.0
    }
}

impl ChainComparison {
    pub fn facilities_saved(&self) -> f64 {
        self.base.total_facilities - self.optimized.total_facilities
    }

    pub fn efficiency_improvement(&self) -> f64 {
        reduction_percent(self.base.total_facilities, self.optimized.total_facilities)
    }

    pub fn workforce_saved(&self) -> f64 {
        self.base.total_workforce - self.optimized.total_workforce
    }

    pub fn workforce_reduction(&self) -> f64 {
        reduction_percent(self.base.total_workforce, self.optimized.total_workforce)
    }

    /// (kind, base, optimized) for every workforce kind in either scenario
    pub fn workforce_breakdown(&self) -> Vec<(String, f64, f64)> {
        let mut kinds: Vec<&String> = self
            .base
            .workforce_by_kind
            .keys()
            .chain(self.optimized.workforce_by_kind.keys())
            .collect();
        kinds.sort();
        kinds.dedup();

        kinds
            .into_iter()
            .map(|kind| {
                let base = self.base.workforce_by_kind.get(kind).copied().unwrap_or(0.0);
                let optimized = self
                    .optimized
                    .workforce_by_kind
                    .get(kind)
                    .copied()
                    .unwrap_or(0.0);
                (kind.clone(), base, optimized)
            })
            .collect()
    }
}

impl fmt::Display for ChainComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Comparison ===")?;
        writeln!(
            f,
            "Target: {} @ {:.2} t/min",
            self.base.target_good, self.base.target_rate
        )?;
        writeln!(f)?;
        writeln!(f, "Base total buildings:      {:.1}", self.base.total_facilities)?;
        writeln!(f, "Optimized total buildings: {:.1}", self.optimized.total_facilities)?;
        writeln!(f, "Buildings saved:           {:.1}", self.facilities_saved())?;
        writeln!(f, "Efficiency improvement:    {:.1}%", self.efficiency_improvement())?;
        writeln!(f)?;
        writeln!(f, "Base total workforce:      {:.0}", self.base.total_workforce)?;
        writeln!(f, "Optimized total workforce: {:.0}", self.optimized.total_workforce)?;
        writeln!(f, "Workforce saved:           {:.0}", self.workforce_saved())?;
        writeln!(f, "Workforce reduction:       {:.1}%", self.workforce_reduction())?;
        writeln!(f)?;
        writeln!(f, "Workforce by type:")?;
        for (kind, base, optimized) in self.workforce_breakdown() {
            writeln!(
                f,
                "  {}: {:.0} -> {:.0} ({:+.0}, {:+.1}%)",
                kind,
                base,
                optimized,
                base - optimized,
                reduction_percent(base, optimized)
            )?;
        }
        Ok(())
    }
}

/// Format a production chain as an indented tree
pub fn format_production_chain(node: &ChainNode, indent: usize) -> String {
    let mut output = String::new();
    let prefix = " ".repeat(indent);

    let node = match node {
        ChainNode::Failed(err) => {
            output.push_str(&format!("{}ERROR: {}\n", prefix, err));
            return output;
        }
        ChainNode::Resolved(node) => node,
    };

    let Some(usage) = &node.facility else {
        output.push_str(&format!("{}{} (raw resource)\n", prefix, node.good));
        output.push_str(&format!("{}   Required: {:.2} t/min\n", prefix, node.target_rate));
        return output;
    };

    output.push_str(&format!("{}{}\n", prefix, node.good));
    output.push_str(&format!("{}   Building: {}\n", prefix, usage.facility_name));
    output.push_str(&format!(
        "{}   Locations: {}\n",
        prefix,
        usage.facility_locations.join(", ")
    ));
    output.push_str(&format!("{}   Count: {:.2}\n", prefix, node.facility_count));
    output.push_str(&format!(
        "{}   Productivity: {:.1}%\n",
        prefix,
        node.productivity * 100.0
    ));
    output.push_str(&format!(
        "{}   Workforce per building: {} {}\n",
        prefix, usage.workforce_per_facility, usage.workforce_kind
    ));
    output.push_str(&format!(
        "{}   Total workforce: {:.0} {}\n",
        prefix, usage.total_workforce, usage.workforce_kind
    ));
    if !node.applied_modifiers.is_empty() {
        output.push_str(&format!(
            "{}   Modifiers: {}\n",
            prefix,
            node.applied_modifiers.join(", ")
        ));
    }
    output.push_str(&format!("{}   Recipe: {}\n", prefix, usage.effective_recipe));
    output.push_str(&format!("{}   Target rate: {:.2} t/min\n", prefix, node.target_rate));

    if !node.required_input_rates.is_empty() {
        output.push_str(&format!("{}   Inputs:\n", prefix));
        for (good, rate) in &node.required_input_rates {
            output.push_str(&format!("{}     {}: {:.2} t/min\n", prefix, good, rate));
        }
    }

    for (good, sub_chain) in &node.sub_chains {
        output.push_str(&format!("{}     <- {}:\n", prefix, good));
        output.push_str(&format_production_chain(sub_chain, indent + 6));
    }

    output
}
