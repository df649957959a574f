// Query string parser
// Turns URL query parameters into a QueryParams block

use url::form_urlencoded;

use super::{QueryCondition, QueryOp, QueryParams, SortDirection, QUERY_OPS};
use crate::error::{GatewayError, GatewayResult};

/// Apply every recognised parameter of `query` to `params`
///
/// Each parameter name maps to its first value; names and values are trimmed
/// and unknown names are ignored.
pub fn apply_query_string(query: Option<&str>, params: &mut QueryParams) -> GatewayResult<()> {
    let mut seen: Vec<String> = Vec::new();

    for (name, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        let name = name.trim();
        if seen.iter().any(|n| n == name) {
            continue;
        }
        seen.push(name.to_string());
        apply_parameter(name, value.trim(), params)?;
    }

    Ok(())
}

fn apply_parameter(name: &str, value: &str, params: &mut QueryParams) -> GatewayResult<()> {
    match name {
        "limit" => params.limit = Some(parse_int(name, value)?),
        "start" => params.start = Some(parse_int(name, value)?),
        "count" => params.count = parse_bool(value),
        "replyWithCount" => params.reply_with_count = parse_bool(value),
        "groupBy" => params.group_by = Some(value.to_string()),
        "sort" => {
            let (direction, field) = parse_sort(value);
            params.sort_direction = Some(direction);
            params.sort_by = Some(field.to_string());
        }
        "fields" => params.fields = Some(parse_fields(value)?),
        "q" => {
            for clause in value.split('&') {
                params.conditions.push(parse_condition(clause)?);
            }
        }
        _ => {}
    }
    Ok(())
}

fn parse_int(name: &str, value: &str) -> GatewayResult<i32> {
    value.parse().map_err(|_| {
        GatewayError::bad_request(format!(
            "Invalid query parameter. '{name}' must be an integer"
        ))
    })
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

fn parse_sort(value: &str) -> (SortDirection, &str) {
    if let Some(field) = value.strip_prefix('+') {
        (SortDirection::Asc, field.trim_start_matches('+'))
    } else if let Some(field) = value.strip_prefix('-') {
        (SortDirection::Desc, field.trim_start_matches('-'))
    } else {
        (SortDirection::Asc, value)
    }
}

fn parse_fields(value: &str) -> GatewayResult<Vec<String>> {
    let fields: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(ToString::to_string)
        .collect();

    if fields.is_empty() {
        return Err(GatewayError::bad_request(
            "Invalid query parameter. 'fields' contains zero field",
        ));
    }
    Ok(fields)
}

/// First operator of [`QUERY_OPS`] contained anywhere in `clause`
///
/// Containment is tested in table order, so `=` wins over every operator that
/// ends with `=`: `a>=1` is detected as `=` with name `a>`.
pub fn detect_operator(clause: &str) -> Option<QueryOp> {
    QUERY_OPS.into_iter().find(|op| clause.contains(op.as_str()))
}

/// Parse one `q` clause into a condition
pub fn parse_condition(clause: &str) -> GatewayResult<QueryCondition> {
    let op = detect_operator(clause).ok_or_else(|| {
        let valid: Vec<&str> = QUERY_OPS.iter().map(|op| op.as_str()).collect();
        GatewayError::bad_request(format!(
            "Invalid query parameter. The '{clause}' in the parameter[q] doesn't contain any query operator. Valid query operators are {valid:?}"
        ))
    })?;

    let (name, value) = clause.split_once(op.as_str()).ok_or_else(|| {
        GatewayError::bad_request(format!(
            "Invalid query parameter. The '{clause}' in parameter[q] is not a key-value pair split by {op}"
        ))
    })?;

    Ok(QueryCondition {
        name: name.trim().to_string(),
        op,
        value: value.to_string(),
    })
}

/// Condition selecting exactly one resource by uuid
pub fn single_resource(uuid: &str) -> QueryCondition {
    QueryCondition {
        name: "uuid".to_string(),
        op: QueryOp::Eq,
        value: uuid.to_string(),
    }
}
