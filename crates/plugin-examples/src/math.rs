//! Script module `clip_math`.

use aviutl2::prelude::*;
use aviutl2::script::ScriptFunction;
use aviutl2::script_function;

/// Numeric helpers for scripts.
#[derive(Debug, Default)]
pub struct ClipMath;

/// Minimum, maximum and mean of `values`, `None` when empty.
#[allow(clippy::cast_precision_loss, reason = "script arrays are short")]
pub fn stats(values: &[f64]) -> Option<(f64, f64, f64)> {
    let (first, rest) = values.split_first()?;
    let (min, max, sum) = rest.iter().fold((*first, *first, *first), |(min, max, sum), v| {
        (min.min(*v), max.max(*v), sum + v)
    });
    Some((min, max, sum / values.len() as f64))
}

fn sum(call: &mut ScriptCall<'_>) -> Result<(), ScriptError> {
    call.require(1)?;
    let total: f64 = call.array_doubles(0).iter().sum();
    call.push_double(total);
    Ok(())
}

fn reverse(call: &mut ScriptCall<'_>) -> Result<(), ScriptError> {
    call.require(1)?;
    let text = call.string(0).ok_or(ScriptError::InvalidArgument {
        index: 0,
        reason: String::from("expected a string"),
    })?;
    call.push_str(&text.chars().rev().collect::<String>())?;
    Ok(())
}

fn array_stats(call: &mut ScriptCall<'_>) -> Result<(), ScriptError> {
    call.require(1)?;
    let values = call.array_doubles(0);
    let (min, max, mean) = stats(&values).ok_or(ScriptError::InvalidArgument {
        index: 0,
        reason: String::from("empty array"),
    })?;
    call.push_table_double(&[("min", min), ("max", max), ("mean", mean)])?;
    Ok(())
}

fn clamp(call: &mut ScriptCall<'_>) -> Result<(), ScriptError> {
    call.require(3)?;
    let (value, low, high) = (call.double(0), call.double(1), call.double(2));
    if low > high {
        return Err(ScriptError::Message(format!("clamp range {low}..{high} is empty")));
    }
    call.push_double(value.clamp(low, high));
    Ok(())
}

fn frame_range(call: &mut ScriptCall<'_>) -> Result<(), ScriptError> {
    call.require(2)?;
    let (start, count) = (call.int(0), call.int(1));
    if count < 0 {
        return Err(ScriptError::InvalidArgument {
            index: 1,
            reason: String::from("negative count"),
        });
    }
    let frames: Vec<i32> = (0..count).map(|i| start.saturating_add(i)).collect();
    call.push_array_int(&frames);
    call.push_int(count);
    Ok(())
}

impl ScriptModule for ClipMath {
    fn new(_info: HostInfo) -> AnyResult<Self> {
        Ok(Self)
    }

    fn module_table(&self) -> ScriptModuleTable {
        let functions: Vec<ScriptFunction> = vec![
            script_function!("sum", sum),
            script_function!("reverse", reverse),
            script_function!("stats", array_stats),
            script_function!("clamp", clamp),
            script_function!("frame_range", frame_range),
        ];
        ScriptModuleTable::new("clip_math: numeric helpers for solid clips", functions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats() -> Result<(), Box<dyn std::error::Error>> {
        assert_eq!(stats(&[]), None);
        let (min, max, mean) = stats(&[3.0, 1.0, 2.0]).ok_or("no stats")?;
        assert!((min - 1.0).abs() < f64::EPSILON);
        assert!((max - 3.0).abs() < f64::EPSILON);
        assert!((mean - 2.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_module_lists_functions() {
        let table = ClipMath.module_table();
        assert_eq!(table.len(), 5);
    }
}
