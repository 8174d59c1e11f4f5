//! the fixed function library available to expressions
//!
//! A subset of the terraform built-in functions, enough to evaluate the expressions commonly used
//! to compose tag maps (`merge(local.tags, { Name = upper(var.name) })`). All functions are pure.
use hcl::eval::{Context, FuncArgs, FuncDef, ParamType};
use hcl::{Number, Value};

type FuncResult = Result<Value, String>;

/// Declares every library function in `ctx`
pub(crate) fn declare_all(ctx: &mut Context) {
    for (name, func) in library() {
        ctx.declare_func(name, func);
    }
}

/// Names of all library functions
pub fn names() -> Vec<&'static str> {
    library().into_iter().map(|(name, _)| name).collect()
}

fn library() -> Vec<(&'static str, FuncDef)> {
    use ParamType::{Any, String as Str};

    let fixed = |params: &[ParamType], func: hcl::eval::Func| {
        let mut builder = FuncDef::builder();
        for param in params {
            builder = builder.param(param.clone());
        }
        builder.build(func)
    };
    let variadic = |param: ParamType, func: hcl::eval::Func| {
        FuncDef::builder().variadic_param(param).build(func)
    };

    vec![
        // strings
        ("upper", fixed(&[Str], upper)),
        ("lower", fixed(&[Str], lower)),
        ("title", fixed(&[Str], title)),
        ("chomp", fixed(&[Str], chomp)),
        ("trimspace", fixed(&[Str], trimspace)),
        ("trim", fixed(&[Str, Str], trim)),
        ("trimprefix", fixed(&[Str, Str], trimprefix)),
        ("trimsuffix", fixed(&[Str, Str], trimsuffix)),
        ("strrev", fixed(&[Str], strrev)),
        ("substr", fixed(&[Str, Any, Any], substr)),
        ("split", fixed(&[Str, Str], split)),
        ("join", variadic(Any, join)),
        ("replace", fixed(&[Str, Str, Str], replace)),
        ("format", variadic(Any, format)),
        ("regex", fixed(&[Str, Str], regex)),
        ("regexall", fixed(&[Str, Str], regexall)),
        ("tostring", fixed(&[Any], tostring)),
        ("tonumber", fixed(&[Any], tonumber)),
        ("tomap", fixed(&[Any], tomap)),
        ("tolist", fixed(&[Any], tolist)),
        ("toset", fixed(&[Any], toset)),
        // collections
        ("concat", variadic(Any, concat)),
        ("coalesce", variadic(Any, coalesce)),
        ("coalescelist", variadic(Any, coalescelist)),
        ("compact", fixed(&[Any], compact)),
        ("contains", fixed(&[Any, Any], contains)),
        ("distinct", fixed(&[Any], distinct)),
        ("element", fixed(&[Any, Any], element)),
        ("flatten", fixed(&[Any], flatten)),
        ("index", fixed(&[Any, Any], index)),
        ("keys", fixed(&[Any], keys)),
        ("values", fixed(&[Any], values)),
        ("length", fixed(&[Any], length)),
        ("lookup", variadic(Any, lookup)),
        ("merge", variadic(Any, merge)),
        ("reverse", fixed(&[Any], reverse)),
        ("slice", fixed(&[Any, Any, Any], slice)),
        ("sort", fixed(&[Any], sort)),
        ("setunion", variadic(Any, setunion)),
        ("range", variadic(Any, range)),
        // encoding
        ("jsonencode", fixed(&[Any], jsonencode)),
        ("jsondecode", fixed(&[Str], jsondecode)),
        // numeric
        ("min", variadic(Any, min)),
        ("max", variadic(Any, max)),
        ("abs", fixed(&[Any], abs)),
        ("ceil", fixed(&[Any], ceil)),
        ("floor", fixed(&[Any], floor)),
        ("pow", fixed(&[Any, Any], pow)),
        ("parseint", fixed(&[Any, Any], parseint)),
    ]
}

fn str_arg(args: &FuncArgs, index: usize) -> Result<&str, String> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(format!("argument {index} must be a string, got {other:?}")),
        None => Err(format!("missing argument {index}")),
    }
}

fn array_arg(args: &FuncArgs, index: usize) -> Result<&Vec<Value>, String> {
    as_array(args.get(index))
}

fn as_array(value: Option<&Value>) -> Result<&Vec<Value>, String> {
    match value {
        Some(Value::Array(array)) => Ok(array),
        Some(other) => Err(format!("expected a list, got {other:?}")),
        None => Err("missing list argument".to_string()),
    }
}

fn as_number(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("invalid number {n}")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("cannot convert \"{s}\" to a number")),
        other => Err(format!("expected a number, got {other:?}")),
    }
}

fn number_arg(args: &FuncArgs, index: usize) -> Result<f64, String> {
    args.get(index)
        .ok_or_else(|| format!("missing argument {index}"))
        .and_then(as_number)
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return Value::Number(Number::from(value as i64));
    }
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// String form of a primitive value, as used by string interpolation
fn to_plain_string(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(format!("cannot convert {other:?} to a string")),
    }
}

fn upper(args: FuncArgs) -> FuncResult {
    Ok(str_arg(&args, 0)?.to_uppercase().into())
}

fn lower(args: FuncArgs) -> FuncResult {
    Ok(str_arg(&args, 0)?.to_lowercase().into())
}

fn title(args: FuncArgs) -> FuncResult {
    let mut out = String::new();
    let mut at_word_start = true;
    for c in str_arg(&args, 0)?.chars() {
        if at_word_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }
    Ok(out.into())
}

fn chomp(args: FuncArgs) -> FuncResult {
    Ok(str_arg(&args, 0)?
        .trim_end_matches(['\n', '\r'])
        .to_string()
        .into())
}

fn trimspace(args: FuncArgs) -> FuncResult {
    Ok(str_arg(&args, 0)?.trim().to_string().into())
}

fn trim(args: FuncArgs) -> FuncResult {
    let cutset: Vec<char> = str_arg(&args, 1)?.chars().collect();
    Ok(str_arg(&args, 0)?
        .trim_matches(cutset.as_slice())
        .to_string()
        .into())
}

fn trimprefix(args: FuncArgs) -> FuncResult {
    let s = str_arg(&args, 0)?;
    Ok(s.strip_prefix(str_arg(&args, 1)?).unwrap_or(s).to_string().into())
}

fn trimsuffix(args: FuncArgs) -> FuncResult {
    let s = str_arg(&args, 0)?;
    Ok(s.strip_suffix(str_arg(&args, 1)?).unwrap_or(s).to_string().into())
}

fn strrev(args: FuncArgs) -> FuncResult {
    Ok(str_arg(&args, 0)?.chars().rev().collect::<String>().into())
}

fn substr(args: FuncArgs) -> FuncResult {
    let chars: Vec<char> = str_arg(&args, 0)?.chars().collect();
    let len = chars.len() as i64;

    let mut offset = number_arg(&args, 1)? as i64;
    if offset < 0 {
        offset = offset.saturating_add(len);
    }
    let offset = offset.clamp(0, len);

    // float to int casts saturate, so `length` may be close to i64::MAX
    let length = number_arg(&args, 2)? as i64;
    let end = if length < 0 {
        len
    } else {
        offset.saturating_add(length).clamp(offset, len)
    };

    Ok(chars[offset as usize..end as usize]
        .iter()
        .collect::<String>()
        .into())
}

fn split(args: FuncArgs) -> FuncResult {
    let separator = str_arg(&args, 0)?;
    let s = str_arg(&args, 1)?;
    if s.is_empty() {
        return Ok(Value::Array(vec![]));
    }
    Ok(Value::Array(
        s.split(separator).map(|part| part.into()).collect(),
    ))
}

fn join(args: FuncArgs) -> FuncResult {
    let separator = str_arg(&args, 0)?;

    let mut parts = vec![];
    for list in args.iter().skip(1) {
        for element in as_array(Some(list))? {
            parts.push(to_plain_string(element)?);
        }
    }

    Ok(parts.join(separator).into())
}

fn replace(args: FuncArgs) -> FuncResult {
    let s = str_arg(&args, 0)?;
    let search = str_arg(&args, 1)?;
    let replacement = str_arg(&args, 2)?;

    if let Some(pattern) = search
        .strip_prefix('/')
        .and_then(|rest| rest.strip_suffix('/'))
    {
        let re = regex::Regex::new(pattern).map_err(|e| e.to_string())?;
        return Ok(re.replace_all(s, replacement).into_owned().into());
    }

    Ok(s.replace(search, replacement).into())
}

/// `format` supporting `%s`, `%d`, `%v`, `%%` and an optional (left aligned) width
fn format(args: FuncArgs) -> FuncResult {
    let spec = str_arg(&args, 0)?;
    let mut values = args.iter().skip(1);
    let mut out = String::new();
    let mut chars = spec.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let left_align = chars.next_if_eq(&'-').is_some();
        let mut width = String::new();
        while let Some(digit) = chars.next_if(char::is_ascii_digit) {
            width.push(digit);
        }
        let width: usize = width.parse().unwrap_or(0);

        let rendered = match chars.next() {
            Some('%') => "%".to_string(),
            Some('s') | Some('v') => {
                to_plain_string(values.next().ok_or("too few arguments for format")?)?
            }
            Some('d') => {
                let n = as_number(values.next().ok_or("too few arguments for format")?)?;
                (n.trunc() as i64).to_string()
            }
            Some(verb) => return Err(format!("unsupported format verb %{verb}")),
            None => return Err("format string ends with %".to_string()),
        };

        if left_align {
            out.push_str(&format!("{rendered:<width$}"));
        } else {
            out.push_str(&format!("{rendered:>width$}"));
        }
    }

    Ok(out.into())
}

fn regex(args: FuncArgs) -> FuncResult {
    let re = regex::Regex::new(str_arg(&args, 0)?).map_err(|e| e.to_string())?;
    let s = str_arg(&args, 1)?;
    let captures = re
        .captures(s)
        .ok_or_else(|| "pattern did not match".to_string())?;
    Ok(captures_to_value(&re, &captures))
}

fn regexall(args: FuncArgs) -> FuncResult {
    let re = regex::Regex::new(str_arg(&args, 0)?).map_err(|e| e.to_string())?;
    let s = str_arg(&args, 1)?;
    Ok(Value::Array(
        re.captures_iter(s)
            .map(|captures| captures_to_value(&re, &captures))
            .collect(),
    ))
}

fn captures_to_value(re: &regex::Regex, captures: &regex::Captures) -> Value {
    if re.captures_len() == 1 {
        return captures
            .get(0)
            .map_or(Value::Null, |m| m.as_str().into());
    }

    let named = re.capture_names().flatten().count() > 0;
    if named {
        return Value::Object(
            re.capture_names()
                .flatten()
                .map(|name| {
                    let value = captures
                        .name(name)
                        .map_or(Value::Null, |m| m.as_str().into());
                    (name.to_string(), value)
                })
                .collect(),
        );
    }

    Value::Array(
        captures
            .iter()
            .skip(1)
            .map(|m| m.map_or(Value::Null, |m| m.as_str().into()))
            .collect(),
    )
}

fn tostring(args: FuncArgs) -> FuncResult {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        other => to_plain_string(other).map(Value::String),
    }
}

fn tonumber(args: FuncArgs) -> FuncResult {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        other => as_number(other).map(number),
    }
}

fn tomap(args: FuncArgs) -> FuncResult {
    match &args[0] {
        value @ (Value::Null | Value::Object(_)) => Ok(value.clone()),
        other => Err(format!("cannot convert {other:?} to map")),
    }
}

fn tolist(args: FuncArgs) -> FuncResult {
    match &args[0] {
        value @ (Value::Null | Value::Array(_)) => Ok(value.clone()),
        other => Err(format!("cannot convert {other:?} to list")),
    }
}

/// Sets are represented as arrays without duplicates
fn toset(args: FuncArgs) -> FuncResult {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Array(_) => distinct(args),
        other => Err(format!("cannot convert {other:?} to set")),
    }
}

fn concat(args: FuncArgs) -> FuncResult {
    let mut out = vec![];
    for list in args.iter() {
        out.extend(as_array(Some(list))?.iter().cloned());
    }
    Ok(Value::Array(out))
}

fn coalesce(args: FuncArgs) -> FuncResult {
    args.iter()
        .find(|value| !matches!(value, Value::Null) && !matches!(value, Value::String(s) if s.is_empty()))
        .cloned()
        .ok_or_else(|| "no non-null, non-empty-string arguments".to_string())
}

fn coalescelist(args: FuncArgs) -> FuncResult {
    for list in args.iter() {
        if !as_array(Some(list))?.is_empty() {
            return Ok(list.clone());
        }
    }
    Err("no non-empty list arguments".to_string())
}

fn compact(args: FuncArgs) -> FuncResult {
    Ok(Value::Array(
        array_arg(&args, 0)?
            .iter()
            .filter(|value| match value {
                Value::Null => false,
                Value::String(s) => !s.is_empty(),
                _ => true,
            })
            .cloned()
            .collect(),
    ))
}

fn contains(args: FuncArgs) -> FuncResult {
    Ok(Value::Bool(array_arg(&args, 0)?.contains(&args[1])))
}

fn distinct(args: FuncArgs) -> FuncResult {
    let mut out: Vec<Value> = vec![];
    for value in array_arg(&args, 0)? {
        if !out.contains(value) {
            out.push(value.clone());
        }
    }
    Ok(Value::Array(out))
}

fn element(args: FuncArgs) -> FuncResult {
    let list = array_arg(&args, 0)?;
    if list.is_empty() {
        return Err("cannot use element function with an empty list".to_string());
    }
    let index = number_arg(&args, 1)? as i64;
    if index < 0 {
        return Err("cannot use element function with a negative index".to_string());
    }
    Ok(list[index as usize % list.len()].clone())
}

fn flatten(args: FuncArgs) -> FuncResult {
    fn flatten_into(list: &[Value], out: &mut Vec<Value>) {
        for value in list {
            match value {
                Value::Array(inner) => flatten_into(inner, out),
                other => out.push(other.clone()),
            }
        }
    }

    let mut out = vec![];
    flatten_into(array_arg(&args, 0)?, &mut out);
    Ok(Value::Array(out))
}

fn index(args: FuncArgs) -> FuncResult {
    array_arg(&args, 0)?
        .iter()
        .position(|value| value == &args[1])
        .map(|position| number(position as f64))
        .ok_or_else(|| "item not found".to_string())
}

fn keys(args: FuncArgs) -> FuncResult {
    match &args[0] {
        Value::Object(object) => {
            let mut keys: Vec<&String> = object.keys().collect();
            keys.sort();
            Ok(Value::Array(keys.into_iter().map(|k| k.clone().into()).collect()))
        }
        other => Err(format!("expected a map, got {other:?}")),
    }
}

fn values(args: FuncArgs) -> FuncResult {
    match &args[0] {
        Value::Object(object) => {
            let mut entries: Vec<(&String, &Value)> = object.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Ok(Value::Array(
                entries.into_iter().map(|(_, v)| v.clone()).collect(),
            ))
        }
        other => Err(format!("expected a map, got {other:?}")),
    }
}

fn length(args: FuncArgs) -> FuncResult {
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Array(array) => array.len(),
        Value::Object(object) => object.len(),
        other => return Err(format!("cannot take the length of {other:?}")),
    };
    Ok(number(len as f64))
}

fn lookup(args: FuncArgs) -> FuncResult {
    if !(2..=3).contains(&args.len()) {
        return Err("lookup expects 2 or 3 arguments".to_string());
    }

    let Value::Object(object) = &args[0] else {
        return Err(format!("expected a map, got {:?}", args[0]));
    };
    let key = str_arg(&args, 1)?;

    object
        .get(key)
        .or_else(|| args.get(2))
        .cloned()
        .ok_or_else(|| format!("the given key \"{key}\" does not exist"))
}

fn merge(args: FuncArgs) -> FuncResult {
    let mut out = hcl::value::Map::new();
    for value in args.iter() {
        match value {
            Value::Object(object) => {
                for (key, value) in object {
                    out.insert(key.clone(), value.clone());
                }
            }
            Value::Null => {}
            other => return Err(format!("merge arguments must be maps, got {other:?}")),
        }
    }
    Ok(Value::Object(out))
}

fn reverse(args: FuncArgs) -> FuncResult {
    Ok(Value::Array(
        array_arg(&args, 0)?.iter().rev().cloned().collect(),
    ))
}

fn slice(args: FuncArgs) -> FuncResult {
    let list = array_arg(&args, 0)?;
    let start = number_arg(&args, 1)? as usize;
    let end = number_arg(&args, 2)? as usize;
    if start > end || end > list.len() {
        return Err(format!("invalid slice range {start}..{end}"));
    }
    Ok(Value::Array(list[start..end].to_vec()))
}

fn sort(args: FuncArgs) -> FuncResult {
    let mut strings = array_arg(&args, 0)?
        .iter()
        .map(to_plain_string)
        .collect::<Result<Vec<_>, _>>()?;
    strings.sort();
    Ok(Value::Array(strings.into_iter().map(Value::String).collect()))
}

fn setunion(args: FuncArgs) -> FuncResult {
    let mut out: Vec<Value> = vec![];
    for list in args.iter() {
        for value in as_array(Some(list))? {
            if !out.contains(value) {
                out.push(value.clone());
            }
        }
    }
    Ok(Value::Array(out))
}

fn range(args: FuncArgs) -> FuncResult {
    let (start, end, step) = match args.len() {
        1 => (0.0, number_arg(&args, 0)?, 1.0),
        2 => (number_arg(&args, 0)?, number_arg(&args, 1)?, 1.0),
        3 => (
            number_arg(&args, 0)?,
            number_arg(&args, 1)?,
            number_arg(&args, 2)?,
        ),
        _ => return Err("range expects 1 to 3 arguments".to_string()),
    };

    if step == 0.0 {
        return Err("step must not be zero".to_string());
    }

    let mut out = vec![];
    let mut current = start;
    while (step > 0.0 && current < end) || (step < 0.0 && current > end) {
        out.push(number(current));
        current += step;
        if out.len() > 1024 {
            return Err("range would produce more than 1024 elements".to_string());
        }
    }
    Ok(Value::Array(out))
}

fn jsonencode(args: FuncArgs) -> FuncResult {
    serde_json::to_string(&args[0])
        .map(Value::String)
        .map_err(|e| e.to_string())
}

fn jsondecode(args: FuncArgs) -> FuncResult {
    serde_json::from_str(str_arg(&args, 0)?).map_err(|e| e.to_string())
}

fn numbers(args: &FuncArgs) -> Result<Vec<f64>, String> {
    if args.is_empty() {
        return Err("at least one number is required".to_string());
    }
    args.iter().map(as_number).collect()
}

fn min(args: FuncArgs) -> FuncResult {
    Ok(number(numbers(&args)?.into_iter().fold(f64::INFINITY, f64::min)))
}

fn max(args: FuncArgs) -> FuncResult {
    Ok(number(numbers(&args)?.into_iter().fold(f64::NEG_INFINITY, f64::max)))
}

fn abs(args: FuncArgs) -> FuncResult {
    Ok(number(number_arg(&args, 0)?.abs()))
}

fn ceil(args: FuncArgs) -> FuncResult {
    Ok(number(number_arg(&args, 0)?.ceil()))
}

fn floor(args: FuncArgs) -> FuncResult {
    Ok(number(number_arg(&args, 0)?.floor()))
}

fn pow(args: FuncArgs) -> FuncResult {
    Ok(number(number_arg(&args, 0)?.powf(number_arg(&args, 1)?)))
}

fn parseint(args: FuncArgs) -> FuncResult {
    let s = str_arg(&args, 0)?;
    let base = number_arg(&args, 1)? as u32;
    if !(2..=36).contains(&base) {
        return Err(format!("unsupported base {base}"));
    }
    i64::from_str_radix(s, base)
        .map(|n| Value::Number(Number::from(n)))
        .map_err(|e| e.to_string())
}
