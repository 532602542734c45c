//! Aggregations over graph collections.
//!
//! Processing order: window, filter, field projection, function, `having`.
//! The filter sees each item's fields as bare variables. `having` sees the
//! aggregate as `value`; when it does not hold the aggregate is unknown.

use crate::context::field_path;
use crate::decision::Tristate;
use crate::evaluator::{eval_error, number_to_decimal, parse_time, Eval, EvalValue, Evaluator};
use crate::expression::{AggregateFunction, Expression, WindowSpec};
use rust_decimal::Decimal;
use serde_json::Value;

pub(crate) fn aggregate(
    ev: &mut Evaluator<'_>,
    function: AggregateFunction,
    collection: &Expression,
    field: Option<&str>,
    filter: Option<&Expression>,
    having: Option<&Expression>,
    window: Option<&WindowSpec>,
) -> Eval<EvalValue> {
    let mut items = match ev.items_of(collection)? {
        Some(items) => items,
        None => return Ok(EvalValue::Unknown),
    };

    if let Some(window) = window {
        items = apply_window(items, window)?;
    }

    if let Some(filter) = filter {
        let mut kept = Vec::with_capacity(items.len());
        for item in items {
            if item_matches(ev, &item, filter)? == Tristate::True {
                kept.push(item);
            }
        }
        items = kept;
    }

    let result = compute(ev, function, &items, field)?;

    match having {
        Some(having) if result != EvalValue::Unknown => {
            ev.ctx.push_binding("value", result.to_json());
            let holds = ev.truth(having);
            ev.ctx.pop_binding();
            match holds? {
                Tristate::True => Ok(result),
                _ => ev.unresolved(format!("HAVING {} rejected {}", having, result.to_json())),
            }
        }
        _ => Ok(result),
    }
}

/// Keeps items whose `timestamp` lies within the window ending at the latest timestamp.
fn apply_window(items: Vec<Value>, window: &WindowSpec) -> Eval<Vec<Value>> {
    let length = window.as_duration().ok_or_else(|| {
        eval_error(format!(
            "invalid window {} {}: unknown unit or duration out of range",
            window.duration, window.unit
        ))
    })?;

    let stamped: Vec<_> = items
        .into_iter()
        .filter_map(|item| {
            let ts = item.get("timestamp").and_then(Value::as_str).and_then(parse_time)?;
            Some((ts, item))
        })
        .collect();

    let latest = match stamped.iter().map(|(ts, _)| *ts).max() {
        Some(latest) => latest,
        None => return Ok(Vec::new()),
    };
    let start = latest.checked_sub_signed(length).ok_or_else(|| {
        eval_error(format!(
            "window {} {} reaches before the earliest representable time",
            window.duration, window.unit
        ))
    })?;
    Ok(stamped
        .into_iter()
        .filter(|(ts, _)| *ts >= start)
        .map(|(_, item)| item)
        .collect())
}

fn item_matches(ev: &mut Evaluator<'_>, item: &Value, filter: &Expression) -> Eval<Tristate> {
    let fields: Vec<(String, Value)> = match item.as_object() {
        Some(obj) => obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        None => vec![("item".to_string(), item.clone())],
    };
    let count = fields.len();
    for (name, value) in fields {
        ev.ctx.push_binding(name, value);
    }
    let outcome = ev.truth(filter);
    for _ in 0..count {
        ev.ctx.pop_binding();
    }
    outcome
}

fn compute(
    ev: &Evaluator<'_>,
    function: AggregateFunction,
    items: &[Value],
    field: Option<&str>,
) -> Eval<EvalValue> {
    let values: Vec<Value> = match field {
        Some(field) => items
            .iter()
            .map(|item| field_path(item, field))
            .filter(|v| !v.is_null())
            .collect(),
        None => items.to_vec(),
    };

    if function == AggregateFunction::Count {
        return Ok(EvalValue::Number(Decimal::from(values.len())));
    }

    let numbers = values
        .iter()
        .map(|v| match v {
            Value::Number(n) => number_to_decimal(n)
                .ok_or_else(|| eval_error(format!("{} is not a finite number", n))),
            other => Err(eval_error(format!(
                "{} needs numbers, found {}",
                function.as_str(),
                other
            ))),
        })
        .collect::<Eval<Vec<Decimal>>>()?;

    let total = numbers
        .iter()
        .try_fold(Decimal::ZERO, |acc, n| acc.checked_add(*n))
        .ok_or_else(|| eval_error(format!("overflow in {}", function.as_str())))?;

    let value = match function {
        AggregateFunction::Count => Decimal::from(numbers.len()),
        AggregateFunction::Sum => total,
        _ if numbers.is_empty() => {
            return ev.unresolved(format!("{} of an empty collection", function.as_str()))
        }
        AggregateFunction::Avg => total
            .checked_div(Decimal::from(numbers.len()))
            .ok_or_else(|| eval_error("overflow in AVG"))?,
        AggregateFunction::Min => numbers.iter().copied().min().unwrap_or_default(),
        AggregateFunction::Max => numbers.iter().copied().max().unwrap_or_default(),
    };

    Ok(match shared_unit(items, field) {
        Some(unit) => EvalValue::Quantity { value, unit },
        None => EvalValue::Number(value),
    })
}

/// Unit shared by every item, when aggregating a `quantity` field.
fn shared_unit(items: &[Value], field: Option<&str>) -> Option<String> {
    if field != Some("quantity") {
        return None;
    }
    let mut units = items.iter().map(|item| item.get("unit").and_then(Value::as_str));
    let first = units.next()??;
    units
        .all(|unit| unit == Some(first))
        .then(|| first.to_string())
}
