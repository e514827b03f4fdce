//! Dashboard layout-JSON validation (§6). A layout is an array of up to 50
//! widget positions, each `{x, y, w, h}` within bounds, with `x + w <= 12`.
//! Total JSON size is capped at 64 KiB, an individual position at 1 KiB.
//! Rejected before the database is touched; violations carry a field-level
//! message so the HTTP layer can surface exactly which item failed.

use serde_json::Value;

pub const MAX_ITEMS: usize = 50;
pub const MAX_TOTAL_BYTES: usize = 64 * 1024;
pub const MAX_ITEM_BYTES: usize = 1024;

const X_MAX: u64 = 11;
const Y_MAX: u64 = 100;
const W_RANGE: std::ops::RangeInclusive<u64> = 1..=12;
const H_RANGE: std::ops::RangeInclusive<u64> = 1..=20;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct LayoutError(pub String);

/// Validates a dashboard's `layout_json`. Returns the first violation found;
/// callers surface it as `invalid-input` before writing anything.
pub fn validate_layout(layout: &Value) -> Result<(), LayoutError> {
    let total_bytes = serde_json::to_vec(layout).map(|b| b.len()).unwrap_or(usize::MAX);
    if total_bytes > MAX_TOTAL_BYTES {
        return Err(LayoutError(format!("layout is {total_bytes} bytes, exceeds the {MAX_TOTAL_BYTES}-byte limit")));
    }

    let items = layout.as_array().ok_or_else(|| LayoutError("layout must be a JSON array".to_string()))?;
    if items.len() > MAX_ITEMS {
        return Err(LayoutError(format!("layout has {} items, exceeds the {MAX_ITEMS}-item limit", items.len())));
    }

    for (idx, item) in items.iter().enumerate() {
        let item_bytes = serde_json::to_vec(item).map(|b| b.len()).unwrap_or(usize::MAX);
        if item_bytes > MAX_ITEM_BYTES {
            return Err(LayoutError(format!("item {idx}: {item_bytes} bytes, exceeds the {MAX_ITEM_BYTES}-byte limit")));
        }

        let x = required_u64(item, "x", idx)?;
        let y = required_u64(item, "y", idx)?;
        let w = required_u64(item, "w", idx)?;
        let h = required_u64(item, "h", idx)?;

        if x > X_MAX {
            return Err(LayoutError(format!("item {idx}: x must be within 0..={X_MAX}, got {x}")));
        }
        if y > Y_MAX {
            return Err(LayoutError(format!("item {idx}: y must be within 0..={Y_MAX}, got {y}")));
        }
        if !W_RANGE.contains(&w) {
            return Err(LayoutError(format!("item {idx}: w must be within {W_RANGE:?}, got {w}")));
        }
        if !H_RANGE.contains(&h) {
            return Err(LayoutError(format!("item {idx}: h must be within {H_RANGE:?}, got {h}")));
        }
        if x + w > 12 {
            return Err(LayoutError(format!("item {idx}: x+w must be <= 12, got x={x} w={w}")));
        }
    }

    Ok(())
}

fn required_u64(item: &Value, field: &str, idx: usize) -> Result<u64, LayoutError> {
    item.get(field)
        .and_then(Value::as_u64)
        .ok_or_else(|| LayoutError(format!("item {idx}: missing or non-integer field `{field}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_layout_is_valid() {
        assert!(validate_layout(&json!([])).is_ok());
    }

    #[test]
    fn compliant_layout_round_trips() {
        let layout = json!([{"x": 0, "y": 0, "w": 6, "h": 4}, {"x": 6, "y": 0, "w": 6, "h": 4}]);
        assert!(validate_layout(&layout).is_ok());
    }

    #[test]
    fn x_plus_w_over_12_is_rejected() {
        let layout = json!([{"x": 8, "y": 0, "w": 6, "h": 4}]);
        let err = validate_layout(&layout).unwrap_err();
        assert!(err.0.contains("x+w"));
    }

    #[test]
    fn more_than_50_items_is_rejected() {
        let items: Vec<Value> = (0..51).map(|_| json!({"x": 0, "y": 0, "w": 1, "h": 1})).collect();
        let err = validate_layout(&json!(items)).unwrap_err();
        assert!(err.0.contains("50-item"));
    }

    #[test]
    fn non_array_is_rejected() {
        assert!(validate_layout(&json!({"x": 0})).is_err());
    }

    #[test]
    fn missing_field_is_rejected() {
        let layout = json!([{"x": 0, "y": 0, "w": 1}]);
        let err = validate_layout(&layout).unwrap_err();
        assert!(err.0.contains("h`"));
    }
}
