use acalc::{State, exec, interactive, strip_comment, stdio};

const HELPMSG: &str = r##"╭───────────────────╮
│   a c a l c       │
│   ─┼──┼──┼──      │
│    1  2  3 ...    │
╰───────────────────╯

acalc - accumulator calculator, one operation per line

Every line applies one operation to the running value:

	N		set the value to N
	+N -N *N /N %N ^N	apply the operator with argument N
	_		negate
	SQRT		square root (value must be positive)
	(+) N1 N2 ...	fold form: apply a binary operator to each argument in turn

Numbers are unsigned decimals with up to 10 digits and at most one point.
Malformed lines print a diagnostic and leave the value as it was.

Command line options:
(order/position of --flags doesn't matter)

<nothing>
	Defaults to "-i".

--inter|-i [PROMPT]
	Interactive mode, standard prompt-eval loop. A custom prompt may be provided, default is "> ".

--expr|-e [--inter|-i] EXPR1 [EXPR2] [EXPR3] ...
	Expression mode, executes expressions in order. If combined with -i, enters interactive mode after expressions are finished.

[--file|-f] [--inter|-i] FILE1 [FILE2] [FILE3] ...
	File mode, executes contents of files in order. May also be combined with -i.
	For each line in the file(s), comments (following the first #) are removed before execution.
	-f is optional: If at least one option is provided without any --flags, file mode is implied.

--help|-h
	Ignores all other options and prints this help message."##;

fn main() {
	//parse options
	let (mut i, mut e, mut f, mut h) = (false, false, false, false);
	let mut names: Vec<String> = Vec::new();
	let args: Vec<String> = std::env::args().skip(1).collect();	//get args, skip name of binary
	if args.is_empty() {i=true;}	//default to interactive
	for arg in args {
		if let Some(flag) = arg.strip_prefix("--") {	//long option
			match flag {
				"inter" => {i=true;}
				"expr" => {e=true;}
				"file" => {f=true;}
				"help" => {h=true;}
				_ => {
					eprintln!("! Unrecognized option: --{flag}, use -h for help");
					std::process::exit(1);
				}
			}
			continue;
		}
		if arg.starts_with('-') {	//short option, multiple at once possible
			for flag in arg.chars() {
				match flag {
					'-' => {}	//allow -f-i or similar
					'i' => {i=true;}
					'e' => {e=true;}
					'f' => {f=true;}
					'h' => {h=true;}
					_ => {
						eprintln!("! Unrecognized option: -{flag}, use -h for help");
						std::process::exit(1);
					}
				}
			}
			continue;
		}
		names.push(arg);
	}

	if h {	//always exits
		println!("{HELPMSG}");
		std::process::exit(0);
	}

	let mut st = State::default();
	let res = match (i, e, f) {
		(false, false, false) => file_mode(&mut st, names, false),	//no flags: assume filenames
		(true, false, false) => interactive_mode(&mut st, names.first().cloned()),	//normal interactive
		(_, true, false) => expression_mode(&mut st, names, i),	//expr mode, pass i on
		(_, false, true) => file_mode(&mut st, names, i),	//file mode, pass i on
		(_, true, true) => {
			eprintln!("! Invalid options: both -e and -f present");
			std::process::exit(1);
		}
	};
	if let Err(er) = res {
		eprintln!("! IO stream failure: {er}");
		std::process::exit(1);
	}
}

fn interactive_mode(st: &mut State, prompt: Option<String>) -> std::io::Result<()> {
	interactive(st, &mut stdio!(), &prompt.unwrap_or_else(|| "> ".into()))
}

fn expression_mode(st: &mut State, exprs: Vec<String>, inter: bool) -> std::io::Result<()> {
	if exprs.is_empty() {
		eprintln!("! No expression provided");
	}
	else {
		for expr in exprs {
			exec(st, &mut stdio!(), &expr)?;
		}
	}
	if inter {
		interactive_mode(st, None)?;
	}
	Ok(())
}

fn file_mode(st: &mut State, files: Vec<String>, inter: bool) -> std::io::Result<()> {
	if files.is_empty() {
		eprintln!("! No file name provided");
	}
	else {
		for file in files {
			match std::fs::read_to_string(&file) {
				Ok(script) => {
					let mut script_nc = String::new();	//script with comments removed
					for line in script.split('\n') {
						script_nc.push_str(strip_comment(line));
						script_nc.push('\n');
					}
					exec(st, &mut stdio!(), &script_nc)?;
				}
				Err(error) => {
					eprintln!("! Unable to read file \"{file}\": {error}");
				}
			}
		}
	}
	if inter {
		interactive_mode(st, None)?;
	}
	Ok(())
}
