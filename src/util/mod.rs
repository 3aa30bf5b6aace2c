mod logger;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
/// A labelled debug-trace level for the engine, ordered from `None`
/// (silent) up to `Verbose`. Tracing compiles out of release builds.
pub enum Log<T> {
    None,
    Default(T),
    Success(T),
    Result(T),
    Verbose(T),
}
