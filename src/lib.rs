use std::fmt;
use std::io::{Write, BufRead};
use rug::{Integer, Float, ops::Pow};

///hard cap on digit characters consumed per literal, the decimal point is free
const MAX_DECIMAL_DIGITS: usize = 10;

///every operation a line can encode
#[derive(Clone, Copy)]
#[repr(u8)]
enum Op {
	Err,
	Set,
	Add,
	Sub,
	Mul,
	Div,
	Rem,
	Neg,
	Pow,
	Sqrt
}
impl Op {
	#[inline(always)]
	///operand count: 0 skips the line, 1 acts on the accumulator alone, 2 takes an argument list
	fn adicity(&self) -> u8 {
		match self {
			Self::Err => 0,
			Self::Neg|Self::Sqrt => 1,
			_ => 2
		}
	}
}

///single-character operators
static OP_CHARS: phf::Map<u8, Op> = phf::phf_map! {
	b'+' => Op::Add,
	b'-' => Op::Sub,
	b'*' => Op::Mul,
	b'/' => Op::Div,
	b'%' => Op::Rem,
	b'^' => Op::Pow,
	b'_' => Op::Neg,
};
///keyword operators, matched as prefixes at the cursor
static OP_WORDS: phf::Map<&'static str, Op> = phf::phf_map! {
	"SQRT" => Op::Sqrt,
};

///diagnostic events, reported on the error stream where found, never fatal
enum Diag<'a> {
	///no operation matched, token runs to end of line
	UnknownOp {token: &'a str},
	///literal terminated by a character it can't contain
	BadArg {at: usize, rest: &'a str},
	///literal hit the digit cap with input left over
	Unparsed {rest: &'a str},
	///binary operation with nothing consumed where arguments belong
	NoArg,
	///zero divisor
	DivZero(&'a Float),
	///zero divisor, remainder flavor
	RemZero(&'a Float),
	///square root of a non-positive accumulator
	BadSqrt(&'a Float),
	///unary operation followed by anything at all
	Suffix {rest: &'a str}
}
impl fmt::Display for Diag<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::UnknownOp {token} => write!(f, "! Unknown operation: {token}"),
			Self::BadArg {at, rest} => write!(f, "! Argument parsing error at {at}: '{rest}'"),
			Self::Unparsed {rest} => write!(f, "! Argument isn't fully parsed, suffix left: '{rest}'"),
			Self::NoArg => write!(f, "! No argument for a binary operation"),
			Self::DivZero(n) => write!(f, "! Bad right argument for division: {}", flt_to_str(n)),
			Self::RemZero(n) => write!(f, "! Bad right argument for remainder: {}", flt_to_str(n)),
			Self::BadSqrt(n) => write!(f, "! Bad argument for SQRT: {}", flt_to_str(n)),
			Self::Suffix {rest} => write!(f, "! Unexpected suffix for a unary operation: '{rest}'")
		}
	}
}

#[inline(always)]
///advance past blanks, the tab through carriage return range plus space
fn skip_ws(line: &str, mut i: usize) -> usize {
	let b = line.as_bytes();
	while b.get(i).is_some_and(|&c| matches!(c, b'\t'..=b'\r' | b' ')) {i += 1;}
	i
}

///reset cursor to the start of the token and report it as unknown
fn rollback(line: &str, i: &mut usize, start: usize, error: &mut dyn Write) -> std::io::Result<(Op, bool)> {
	*i = start;
	writeln!(error, "{}", Diag::UnknownOp {token: &line[start..]})?;
	Ok((Op::Err, false))
}

///classify the operation token at the cursor
///
///fold wrapping (a leading '(') is detected first and returned alongside the
///operation, it is never stored anywhere between lines
///a leading digit means Set and stays unconsumed for the argument parser
fn parse_op(line: &str, i: &mut usize, error: &mut dyn Write) -> std::io::Result<(Op, bool)> {
	let b = line.as_bytes();
	let start = *i;
	let fold = b.get(*i)==Some(&b'(');
	if fold {*i += 1;}

	let Some(&c) = b.get(*i) else {
		return rollback(line, i, start, error);
	};
	if c.is_ascii_digit() {
		return Ok((Op::Set, fold));
	}
	if let Some(&op) = OP_CHARS.get(&c) {
		*i += 1;
		if fold && op.adicity()==2 {	//fold form must close right after a binary operator
			if b.get(*i)==Some(&b')') {*i += 1;}
			else {
				return rollback(line, i, start, error);
			}
		}
		return Ok((op, fold));
	}
	for (word, &op) in OP_WORDS.entries() {
		if line[*i..].starts_with(*word) {
			*i += word.len();
			return Ok((op, fold));
		}
	}
	rollback(line, i, start, error)
}

///parse one unsigned decimal literal, advancing the cursor past all consumed characters
///
///digits accumulate into an exact integer mantissa with a decimal scale,
///divided once into the working precision at the end
///stops at the first foreign character, a second '.', or the digit cap
///`None` means the literal was rejected: only outside fold mode, where the
///offending remainder is reported and the value discarded, so a diagnosed
///line never half-applies
fn parse_arg(line: &str, i: &mut usize, fold: bool, w: u32, error: &mut dyn Write) -> std::io::Result<Option<Float>> {
	let b = line.as_bytes();
	let mut man = Integer::ZERO;	//mantissa, built left to right
	let mut scale = Integer::from(1);	//denominator, grows once fractional digits start
	let mut frac = false;
	let mut digits = 0_usize;
	let mut good = true;
	while good && digits<MAX_DECIMAL_DIGITS {
		match b.get(*i) {
			Some(c) if c.is_ascii_digit() => {
				man *= 10;
				man += *c - b'0';
				if frac {scale *= 10;}
				*i += 1;
				digits += 1;
			}
			Some(&b'.') if !frac => {
				frac = true;
				*i += 1;
			}
			None => break,
			_ => {good = false;}
		}
	}
	if !good && !fold {
		writeln!(error, "{}", Diag::BadArg {at: *i, rest: &line[*i..]})?;
		return Ok(None);
	}
	if good && *i<line.len() && !fold {	//cap hit with input remaining
		writeln!(error, "{}", Diag::Unparsed {rest: &line[*i..]})?;
		return Ok(None);
	}
	Ok(Some(Float::with_val(w, man) / scale))
}

///collect the argument list: one literal normally, as many as the line holds in fold mode
///
///fold mode keeps going while whitespace-separated digits follow, a non-digit
///with input remaining aborts the list as malformed
fn parse_args(line: &str, i: &mut usize, fold: bool, w: u32, error: &mut dyn Write) -> std::io::Result<Vec<Float>> {
	let b = line.as_bytes();
	let mut args = Vec::new();
	loop {
		let arg = parse_arg(line, i, fold, w, error)?;
		*i = skip_ws(line, *i);
		if let Some(a) = arg {args.push(a);}
		if fold && *i<line.len() && !b[*i].is_ascii_digit() {
			writeln!(error, "{}", Diag::BadArg {at: *i, rest: &line[*i..]})?;
			break;
		}
		if !fold || *i>=line.len() {break;}
	}
	Ok(args)
}

///apply a unary operation to the accumulator
fn unary(op: Op, current: Float, error: &mut dyn Write) -> std::io::Result<Float> {
	Ok(
		match op {
			Op::Neg => -current,
			Op::Sqrt => {
				if current>0 {current.sqrt()}
				else {
					writeln!(error, "{}", Diag::BadSqrt(&current))?;
					current
				}
			}
			_ => current
		}
	)
}

///fold a binary operation over the argument list, left to right from the accumulator
///
///Set takes the first argument and ignores the rest
///Div and Rem short-circuit on a zero divisor, handing back the pre-operation value
fn binary(op: Op, left: &Float, args: &[Float], error: &mut dyn Write) -> std::io::Result<Float> {
	let w = left.prec();
	let mut acc = left.clone();
	for arg in args {
		match op {
			Op::Set => {
				return Ok(arg.clone());
			}
			Op::Add => {acc = Float::with_val(w, &acc + arg);}
			Op::Sub => {acc = Float::with_val(w, &acc - arg);}
			Op::Mul => {acc = Float::with_val(w, &acc * arg);}
			Op::Div => {
				if arg.is_zero() {
					writeln!(error, "{}", Diag::DivZero(arg))?;
					return Ok(left.clone());
				}
				acc = Float::with_val(w, &acc / arg);
			}
			Op::Rem => {
				if arg.is_zero() {
					writeln!(error, "{}", Diag::RemZero(arg))?;
					return Ok(left.clone());
				}
				acc = Float::with_val(w, &acc % arg);
			}
			Op::Pow => {acc = Float::with_val(w, (&acc).pow(arg));}	//real-power semantics, NaN passes through silently
			_ => {
				return Ok(left.clone());
			}
		}
	}
	Ok(acc)
}

///Evaluates one line against the accumulator and returns the new value.
///
///Never fails on calculator grounds: every malformed input degrades to a
///diagnostic on the error stream plus an unchanged (for Div/Rem, pre-operation)
///accumulator. The result keeps the precision of the value passed in.
///
///Terminates with `Err` only if a write on the error stream fails.
pub fn process_line(current: Float, line: &str, error: &mut dyn Write) -> std::io::Result<Float> {
	let mut i = 0_usize;
	let (op, fold) = parse_op(line, &mut i, error)?;
	match op.adicity() {
		2 => {
			i = skip_ws(line, i);
			let start = i;
			let args = parse_args(line, &mut i, fold, current.prec(), error)?;
			if i==start {	//nothing consumed where arguments belong
				writeln!(error, "{}", Diag::NoArg)?;
				return Ok(current);
			}
			if i<line.len() {	//malformed remainder, reported where it was found
				return Ok(current);
			}
			binary(op, &current, &args, error)
		}
		1 => {
			if i<line.len() {
				writeln!(error, "{}", Diag::Suffix {rest: &line[i..]})?;
				return Ok(current);
			}
			unary(op, current, error)
		}
		_ => Ok(current)
	}
}

///Running calculator state: one accumulator that every processed line maps to its successor.
pub struct State {
	///the accumulator
	acc: Float
}
impl Default for State {
	///zero at 256 bits of working precision
	fn default() -> Self {
		Self {acc: Float::with_val(256, 0)}
	}
}
impl State {
	///custom working precision, current value is re-rounded
	pub fn custom_w(mut self, w: u32) -> Self {
		self.acc = Float::with_val(w, &self.acc);
		self
	}
	///custom initial value, cleaner than a Set line
	pub fn custom_value(mut self, v: Float) -> Self {
		self.acc = v;
		self
	}
	///current accumulator
	pub fn value(&self) -> &Float {
		&self.acc
	}
}

///number printing for the echo and for value-carrying diagnostics:
///special values by name, trailing zeros trimmed, small negative exponents expanded
pub fn flt_to_str(num: &Float) -> String {
	if !num.is_normal() {
		if num.is_zero() {
			return String::from("0");	//always "0" regardless of sign
		}
		let mut ret = String::from(if num.is_sign_negative() {"-"} else {""});
		if num.is_infinite() {
			ret += "∞";
			return ret;
		}
		ret += "NaN";
		return ret;
	}
	let mut outstr = num.to_string_radix(10, None);
	if outstr[outstr.len().saturating_sub(11)..].contains('e') {	//efficiently check if in exponential notation
		let (mut mpart, epart) = outstr.rsplit_once('e').unwrap();
		mpart = mpart.trim_end_matches('0').trim_end_matches('.');	//remove trailing zeros from mantissa
		let eint = epart.parse::<i32>().unwrap();
		if eint<0 && eint>-10 {	//convert from exponential notation if not too small
			let zeros = "0".repeat(eint.unsigned_abs() as usize - 1);
			outstr = if let Some(m) = mpart.strip_prefix('-') {
				"-0.".to_string() + &zeros + &m.replacen('.', "", 1)
			}
			else {
				"0.".to_string() + &zeros + &mpart.replacen('.', "", 1)
			};
		}
		else {
			outstr = mpart.to_string() + "e" + epart;
		}
	}
	else if let Some((ipart, fpart)) = outstr.split_once('.') {
		outstr = ipart.to_string() + "." + fpart.trim_end_matches('0');	//trim trailing zeros
	}
	outstr.trim_end_matches('.').to_string()	//remove leftover fractional separator
}

///Bundle of generic IO streams, for brevity.
pub struct IOTriple<'a> {
	pub input: &'a mut dyn BufRead,
	pub output: &'a mut dyn Write,
	pub error: &'a mut dyn Write
}
#[macro_export]
///Default IO triple using stdin, stdout, stderr
macro_rules! stdio {
	() => {
		::acalc::IOTriple {
			input: &mut ::std::io::BufReader::new(::std::io::stdin()),
			output: &mut ::std::io::stdout(),
			error: &mut ::std::io::stderr()
		}
	}
}

///Runs a script on the given state, using the provided IO streams.
///
///Every nonempty line goes through [`process_line`] and the new accumulator is
///echoed to the output stream. Empty lines are skipped. State persists across
///lines and across calls.
///
///Usage of the provided IO streams:
///- input: Unused here, present for drivers built on top.
///- output: One echo of the accumulator per processed line.
///- error: All diagnostics.
///
///Terminates with `Err` only if a write on an IO stream fails.
pub fn exec(st: &mut State, io: &mut IOTriple, script: &str) -> std::io::Result<()> {
	for line in script.lines() {
		if line.is_empty() {continue;}
		let cur = std::mem::replace(&mut st.acc, Float::new(1));
		st.acc = process_line(cur, line, io.error)?;
		writeln!(io.output, "{}", flt_to_str(&st.acc))?;
	}
	Ok(())
}

///Standard prompt-eval loop on the given state. Reads lines from the input
///stream until EOF, passing each to [`exec`].
pub fn interactive(st: &mut State, io: &mut IOTriple, prompt: &str) -> std::io::Result<()> {
	loop {
		write!(io.output, "{prompt}")?;
		io.output.flush()?;
		let mut line = String::new();
		if io.input.read_line(&mut line)? == 0 {break;}	//EOF ends the session
		exec(st, io, &line)?;
	}
	Ok(())
}

///Cuts a '#' comment off a script line, together with the blanks left in front
///of it. A line that is all comment collapses to the empty string, which
///[`exec`] skips.
pub fn strip_comment(line: &str) -> &str {
	line.split_once('#').unwrap_or((line, "")).0.trim_end()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rug::float::Special;

	const W: u32 = 64;

	fn arg(line: &str, fold: bool) -> (Option<Float>, usize, String) {
		let mut i = 0;
		let mut err = Vec::new();
		let v = parse_arg(line, &mut i, fold, W, &mut err).unwrap();
		(v, i, String::from_utf8(err).unwrap())
	}

	fn op(line: &str) -> (Op, bool, usize, String) {
		let mut i = 0;
		let mut err = Vec::new();
		let (o, fold) = parse_op(line, &mut i, &mut err).unwrap();
		(o, fold, i, String::from_utf8(err).unwrap())
	}

	#[test]
	fn ws_skipping() {
		assert_eq!(skip_ws("  \tx", 0), 3);
		assert_eq!(skip_ws("x  ", 0), 0);
		assert_eq!(skip_ws("   ", 0), 3);
		assert_eq!(skip_ws("\x0B\x0C\r\nx", 0), 4);	//the full blank range counts
	}

	#[test]
	fn literal_integer() {
		let (v, i, msgs) = arg("25", false);
		assert_eq!(v.unwrap(), 25);
		assert_eq!(i, 2);
		assert!(msgs.is_empty());
	}

	#[test]
	fn literal_fraction() {
		let (v, i, _) = arg("2.5", false);
		assert_eq!(v.unwrap(), 2.5);
		assert_eq!(i, 3);
	}

	#[test]
	fn literal_leading_dot() {
		//valid in argument position, only the operation parser insists on a digit
		let (v, i, _) = arg(".5", false);
		assert_eq!(v.unwrap(), 0.5);
		assert_eq!(i, 2);
	}

	#[test]
	fn literal_trailing_dot() {
		let (v, i, msgs) = arg("5.", false);
		assert_eq!(v.unwrap(), 5);
		assert_eq!(i, 2);
		assert!(msgs.is_empty());
	}

	#[test]
	fn literal_digit_cap() {
		let (v, i, msgs) = arg("12345678901", false);
		assert!(v.is_none());	//capped with input left over, the whole literal is refused
		assert_eq!(i, 10);
		assert!(msgs.contains("suffix left: '1'"));
		let (v, _, msgs) = arg("12345678901", true);	//fold keeps the capped value quietly
		assert_eq!(v.unwrap(), 1234567890_u64);
		assert!(msgs.is_empty());
	}

	#[test]
	fn literal_cap_counts_both_sides_of_dot() {
		let (v, i, _) = arg("12345.678901", true);
		assert_eq!(i, 11);	//ten digits plus the free dot
		assert_eq!(v.unwrap(), Float::with_val(W, 1234567890_u64)/100000_u32);
		let (v, _, _) = arg("12345.678901", false);
		assert!(v.is_none());
	}

	#[test]
	fn literal_second_dot_rejected() {
		let (v, i, msgs) = arg("1.2.3", false);
		assert!(v.is_none());
		assert_eq!(i, 3);
		assert!(msgs.contains("Argument parsing error at 3: '.3'"));
	}

	#[test]
	fn literal_junk_rejected_outside_fold() {
		let (v, i, msgs) = arg("x", false);
		assert!(v.is_none());
		assert_eq!(i, 0);
		assert!(msgs.contains("Argument parsing error at 0: 'x'"));
	}

	#[test]
	fn literal_junk_kept_quiet_in_fold() {
		//fold mode leaves the decision to the list parser
		let (v, i, msgs) = arg("x", true);
		assert_eq!(v.unwrap(), 0);
		assert_eq!(i, 0);
		assert!(msgs.is_empty());
	}

	#[test]
	fn literal_empty_is_zero() {
		let (v, i, msgs) = arg("", false);
		assert_eq!(v.unwrap(), 0);
		assert_eq!(i, 0);
		assert!(msgs.is_empty());
	}

	#[test]
	fn op_single_chars() {
		assert!(matches!(op("+5"), (Op::Add, false, 1, _)));
		assert!(matches!(op("-1"), (Op::Sub, false, 1, _)));
		assert!(matches!(op("*"), (Op::Mul, false, 1, _)));
		assert!(matches!(op("/"), (Op::Div, false, 1, _)));
		assert!(matches!(op("%"), (Op::Rem, false, 1, _)));
		assert!(matches!(op("^2"), (Op::Pow, false, 1, _)));
		assert!(matches!(op("_"), (Op::Neg, false, 1, _)));
	}

	#[test]
	fn op_digit_means_set_unconsumed() {
		let (o, fold, i, _) = op("42");
		assert!(matches!(o, Op::Set));
		assert!(!fold);
		assert_eq!(i, 0);	//digit stays for the argument parser
	}

	#[test]
	fn op_fold_wrapping() {
		let (o, fold, i, msgs) = op("(+) 1 2");
		assert!(matches!(o, Op::Add));
		assert!(fold);
		assert_eq!(i, 3);
		assert!(msgs.is_empty());
	}

	#[test]
	fn op_fold_missing_close() {
		let (o, _, i, msgs) = op("(+ 1");
		assert!(matches!(o, Op::Err));
		assert_eq!(i, 0);	//cursor back at the token start
		assert!(msgs.contains("Unknown operation: (+ 1"));
	}

	#[test]
	fn op_fold_unary_skips_close_check() {
		//'(_)' classifies fine, the suffix check catches the ')' later
		let (o, fold, i, msgs) = op("(_)");
		assert!(matches!(o, Op::Neg));
		assert!(fold);
		assert_eq!(i, 2);
		assert!(msgs.is_empty());
	}

	#[test]
	fn op_keyword_prefix() {
		assert!(matches!(op("SQRT"), (Op::Sqrt, false, 4, _)));
		let (o, _, i, _) = op("SQRTX");
		assert!(matches!(o, Op::Sqrt));	//prefix matches, the remainder is a suffix problem
		assert_eq!(i, 4);
	}

	#[test]
	fn op_unknown_resets_cursor() {
		let (o, _, i, msgs) = op("@5");
		assert!(matches!(o, Op::Err));
		assert_eq!(i, 0);
		assert!(msgs.contains("Unknown operation: @5"));
		assert!(matches!(op("SQRX"), (Op::Err, _, 0, _)));
		assert!(matches!(op(""), (Op::Err, _, 0, _)));
	}

	#[test]
	fn formatting() {
		assert_eq!(flt_to_str(&Float::with_val(W, 0)), "0");
		assert_eq!(flt_to_str(&Float::with_val(W, -0.0)), "0");
		assert_eq!(flt_to_str(&Float::with_val(W, 15)), "15");
		assert_eq!(flt_to_str(&Float::with_val(W, 2.5)), "2.5");
		assert_eq!(flt_to_str(&Float::with_val(W, -4)), "-4");
		assert_eq!(flt_to_str(&Float::with_val(W, Special::Infinity)), "∞");
		assert_eq!(flt_to_str(&Float::with_val(W, Special::NegInfinity)), "-∞");
		assert_eq!(flt_to_str(&Float::with_val(W, Special::Nan)), "NaN");
	}
}
