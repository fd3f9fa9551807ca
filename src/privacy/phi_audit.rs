// Static audit over every source file: tracing calls must not carry fields
// that hold patient text. Logs use lengths, counts and ids instead.
