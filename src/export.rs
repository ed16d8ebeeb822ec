//! CSV export of flow records and period aggregates

use crate::calendar;
use crate::period::{GroupDimension, PeriodAggregate};
use crate::types::FlowRecord;
use std::io::Write;

const FLOW_HEADER: &[&str] = &[
    "fund_house",
    "scheme_name",
    "category",
    "sub_category",
    "month_end",
    "prev_month_end",
    "fiscal_year",
    "fiscal_quarter",
    "month_label",
    "nav_cur",
    "nav_prev",
    "nav_return",
    "aum_cur_cr",
    "aum_prev_cr",
    "expected_aum_cr",
    "net_flow_cr",
    "flow_pct",
    "basis",
];

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One row per record, with fiscal labels for charting tools.
pub fn write_flows_csv<W: Write>(writer: W, records: &[FlowRecord]) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    wtr.write_record(FLOW_HEADER)?;

    for r in records {
        wtr.write_record(&[
            r.fund_house.clone(),
            r.scheme.name().to_string(),
            r.category.as_str().to_string(),
            r.sub_category.clone(),
            r.month_end.to_string(),
            r.prev_month_end.to_string(),
            calendar::fiscal_year_label(r.month_end),
            calendar::fiscal_quarter_label(r.month_end),
            calendar::month_label(r.month_end),
            opt(r.nav_cur),
            opt(r.nav_prev),
            r.nav_return.to_string(),
            r.aum_cur.to_string(),
            r.aum_prev.to_string(),
            r.expected_aum.to_string(),
            r.net_flow.to_string(),
            r.flow_pct.to_string(),
            r.basis.as_str().to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// One row per aggregate; one column per grouping dimension.
pub fn write_aggregates_csv<W: Write>(
    writer: W,
    aggregates: &[PeriodAggregate],
    group_by: &[GroupDimension],
) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    let mut header = vec!["period".to_string(), "period_end".to_string()];
    header.extend(group_by.iter().map(|dim| dim.as_str().to_string()));
    header.extend(
        ["net_flow_cr", "aum_cr", "flow_pct", "months"]
            .iter()
            .map(|s| s.to_string()),
    );
    wtr.write_record(&header)?;

    for agg in aggregates {
        let mut row = vec![agg.period_label.clone(), agg.period_sort.to_string()];
        row.extend(agg.group.iter().cloned());
        row.push(agg.net_flow.to_string());
        row.push(agg.aum.to_string());
        row.push(agg.flow_pct.to_string());
        row.push(agg.months.to_string());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}
