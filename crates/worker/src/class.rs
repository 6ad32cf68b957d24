/// Execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Non-mutating request callbacks, run concurrently on the blocking pool.
	Read,
	/// Mutating request callbacks, run on the blocking pool one logical slot at a time.
	Write,
	/// Short async coordination work: permit acquisition, outcome publication.
	Control,
}

impl TaskClass {
	/// Stable name used in tracing fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Read => "read",
			Self::Write => "write",
			Self::Control => "control",
		}
	}
}
