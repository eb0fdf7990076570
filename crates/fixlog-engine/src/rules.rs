//! Built-in classification policy.
//!
//! Tables are ordered: the first matching row wins, so narrower patterns sit
//! above broader ones (a docker "pull access denied" must be seen before the
//! generic permission row, a database `ECONNREFUSED :5432` before the network
//! one). Patterns are matched case-insensitively.

use fixlog_core::Category;

/// `(pattern, category, sub_category)` rows matched against the snippet.
pub(crate) const CATEGORY_RULES: &[(&str, Category, &str)] = &[
    // Null access
    (
        r"cannot read propert(y|ies) of (undefined|null)",
        Category::Runtime,
        "null_reference",
    ),
    (
        r"(undefined|null) is not an object|'nonetype' object has no attribute|nullpointerexception|called .option::unwrap\(\). on a .none. value",
        Category::Runtime,
        "null_reference",
    ),
    // Memory
    (
        r"heap out of memory|out of memory|cannot allocate memory|memoryerror|\boom\b|killed.*signal 9",
        Category::Memory,
        "out_of_memory",
    ),
    (
        r"maximum call stack size exceeded|stack overflow|recursionerror",
        Category::Memory,
        "stack_overflow",
    ),
    (
        r"segmentation fault|\bsigsegv\b|core dumped",
        Category::Memory,
        "segfault",
    ),
    // Docker
    (
        r"cannot connect to the docker daemon|docker daemon is not running",
        Category::Docker,
        "daemon_unavailable",
    ),
    (
        r"dockerfile|docker build|docker compose|docker-compose|no such container|pull access denied|manifest unknown",
        Category::Docker,
        "container_error",
    ),
    // Git
    (
        r"conflict \(content\)|merge conflict|automatic merge failed|unmerged paths",
        Category::Git,
        "merge_conflict",
    ),
    (r"not a git repository", Category::Git, "not_a_repo"),
    (
        r"\[rejected\]|non-fast-forward|failed to push some refs",
        Category::Git,
        "push_rejected",
    ),
    (
        r"pathspec .* did not match|local changes .* would be overwritten",
        Category::Git,
        "working_tree",
    ),
    // Editor tool failures
    (
        r"string to replace not found|old_string .*not found|file has not been read yet|file has been modified since|found \d+ matches of the string",
        Category::Edit,
        "edit_mismatch",
    ),
    // Database
    (
        r#"relation ".*" does not exist|no such table|table .* doesn't exist|unknown table"#,
        Category::Database,
        "missing_table",
    ),
    (
        r"duplicate key value|unique constraint|integrity constraint|foreign key constraint",
        Category::Database,
        "constraint_violation",
    ),
    (
        r"deadlock detected|database is locked|lock wait timeout",
        Category::Database,
        "lock_contention",
    ),
    (
        r"sqlstate|connection to server .* failed|could not connect to (the )?database|can't reach database|econnrefused.*:(5432|3306|27017|6379)\b",
        Category::Database,
        "connection_failed",
    ),
    (
        r"migration.*failed|pending migrations?",
        Category::Database,
        "migration",
    ),
    // Network
    (
        r"\beaddrinuse\b|address already in use",
        Category::Network,
        "port_in_use",
    ),
    (
        r"\beconnrefused\b|connection refused",
        Category::Network,
        "connection_refused",
    ),
    (
        r"\benotfound\b|getaddrinfo|could not resolve host|name or service not known|network is unreachable|\beconnreset\b|socket hang up",
        Category::Network,
        "unreachable",
    ),
    (
        r"certificate verify failed|ssl routines|tls handshake|self.signed certificate",
        Category::Network,
        "tls",
    ),
    // Permission
    (
        r"\beacces\b|permission denied|\beperm\b|operation not permitted|access is denied",
        Category::Permission,
        "access_denied",
    ),
    // Dependencies
    (
        r"\beresolve\b|peer dep|conflicting peer dependency|could not resolve dependency",
        Category::Dependency,
        "peer_dependency",
    ),
    (
        r"version solving failed|no matching version|failed to select a version|resolutionimpossible|incompatible versions",
        Category::Dependency,
        "version_conflict",
    ),
    (
        r"lockfile .*(out of date|needs to be updated)|frozen.lockfile|lock file .* out of date",
        Category::Dependency,
        "lockfile",
    ),
    // Modules
    (
        r"cannot find module|module not found|modulenotfounderror|no module named|unresolved import|cannot find package|failed to resolve import|could not find a declaration file",
        Category::Module,
        "module_not_found",
    ),
    (
        r"importerror|cannot import name|does not provide an export named|has no exported member|is not exported",
        Category::Module,
        "bad_import",
    ),
    // Types
    (
        r"property '.*' does not exist on type|no field .* on type|no method named",
        Category::Type,
        "missing_property",
    ),
    (
        r"error ts\d+|is not assignable to (type|parameter)|mismatched types|error\[e0308\]|argument of type",
        Category::Type,
        "type_mismatch",
    ),
    // Runtime
    (
        r"is not a function|is not a constructor|is not callable",
        Category::Runtime,
        "not_a_function",
    ),
    (
        r"referenceerror|is not defined|nameerror",
        Category::Runtime,
        "undefined_reference",
    ),
    (
        r"index out of range|index out of bounds|indexerror|arrayindexoutofbounds",
        Category::Runtime,
        "index_out_of_bounds",
    ),
    (r"keyerror|undefined index", Category::Runtime, "missing_key"),
    (
        r"no such file or directory|\benoent\b|filenotfounderror",
        Category::Runtime,
        "file_not_found",
    ),
    // Syntax
    (
        r"indentationerror|unexpected indent",
        Category::Syntax,
        "indentation",
    ),
    (
        r"syntaxerror|unexpected token|unexpected end of (input|file)|parse error|parsing error|expected expression|invalid syntax|unterminated",
        Category::Syntax,
        "unexpected_token",
    ),
    // Tests
    (
        r"snapshots? (failed|mismatch|obsolete)|snapshot .* mismatch",
        Category::Test,
        "snapshot_mismatch",
    ),
    (
        r"exceeded timeout of \d+ ?ms|test timed out|timeout - async callback",
        Category::Test,
        "test_timeout",
    ),
    (
        r"assertionerror|assertion failed|assert failed|expect\(.*\)\.to|tests? failed|failing tests?|\d+ failed|test result: failed",
        Category::Test,
        "assertion_failure",
    ),
    // Lint
    (
        r"eslint|prettier|clippy|stylelint|flake8|pylint|\bruff\b|lint(ing)? (error|failed)",
        Category::Lint,
        "style_violation",
    ),
    // Build
    (
        r"undefined reference to|ld returned|linking with .* failed|linker .* not found",
        Category::Build,
        "link_error",
    ),
    (
        r"build failed|compilation failed|failed to compile|could not compile|build error|error during build|rollup failed|make: \*\*\*",
        Category::Build,
        "build_failure",
    ),
    // Timeouts
    (
        r"timed out|timeout exceeded|deadline exceeded|\betimedout\b",
        Category::Timeout,
        "operation_timeout",
    ),
    // Configuration
    (
        r"command not found|is not recognized as an internal or external command",
        Category::Config,
        "command_not_found",
    ),
    (
        r"unknown option|unrecognized (option|argument)|invalid option",
        Category::Config,
        "invalid_option",
    ),
    (
        r"invalid configuration|configuration error|missing (required )?environment variable|environment variable .* (not set|missing)",
        Category::Config,
        "invalid_config",
    ),
    // Unhandled crashes that matched nothing more specific
    (
        r"panicked at|unhandled (promise )?rejection|uncaught exception|traceback \(most recent call last\)",
        Category::Runtime,
        "unhandled_exception",
    ),
];

/// `(pattern, framework)` rows matched against snippet + command context.
pub(crate) const FRAMEWORK_RULES: &[(&str, &str)] = &[
    (r"next\.js|next (build|dev|start)|getserversideprops|\.next/", "nextjs"),
    (r"\bnuxt", "nuxt"),
    (r"\bvitest\b", "vitest"),
    (r"\bjest\b", "jest"),
    (r"\bpytest\b", "pytest"),
    (r"\bplaywright\b", "playwright"),
    (r"\bcypress\b", "cypress"),
    (r"\breact\b|react-dom|\.jsx\b|\.tsx\b|\buse(state|effect)\b", "react"),
    (r"\bvue\b|\.vue\b", "vue"),
    (r"\bangular\b|\bng (build|serve|test)\b", "angular"),
    (r"\bsvelte", "svelte"),
    (r"\bdjango\b|manage\.py", "django"),
    (r"\bflask\b", "flask"),
    (r"\bfastapi\b", "fastapi"),
    (r"\bprisma\b", "prisma"),
    (r"\bcargo\b|\brustc\b|error\[e\d{4}\]", "rust"),
    (r"\bgo (build|test|run|mod)\b|\.go:\d+", "go"),
    (r"\bdocker\b|docker-compose", "docker"),
    (r"\bvite\b", "vite"),
    (r"\bwebpack\b", "webpack"),
    (r"\btsc\b|error ts\d+", "typescript"),
    (r"\bnpm\b|\byarn\b|\bpnpm\b|node_modules|\bnode:", "node"),
    (r"\bpython3?\b|\bpip3?\b|traceback \(most recent", "python"),
];

const FRAMEWORK_ADVICE: &[(&str, &str)] = &[
    (
        "nextjs",
        "Check server/client component boundaries and data fetching; clear .next/ after config changes.",
    ),
    (
        "nuxt",
        "Confirm auto-imports and server routes; clear .nuxt/ when generated types go stale.",
    ),
    (
        "react",
        "Guard optional props and async state before rendering; check hook dependency arrays.",
    ),
    (
        "vue",
        "Check reactive refs are unwrapped where used and props are declared with types.",
    ),
    (
        "angular",
        "Verify module/standalone imports and injection providers for the failing component.",
    ),
    (
        "svelte",
        "Check reactive statements and store subscriptions run before values are read.",
    ),
    (
        "jest",
        "Reset mocks between tests and await async work; update snapshots only after review.",
    ),
    (
        "vitest",
        "Check test environment (jsdom/node) and mock hoisting for the failing suite.",
    ),
    (
        "pytest",
        "Run the single failing test with -x -vv and check fixture scope and ordering.",
    ),
    (
        "playwright",
        "Prefer locator auto-waiting over fixed sleeps; inspect the trace for flaky steps.",
    ),
    (
        "cypress",
        "Avoid fixed waits; alias network calls and wait on them instead.",
    ),
    (
        "django",
        "Run makemigrations/migrate after model changes and check INSTALLED_APPS.",
    ),
    (
        "flask",
        "Check app context usage and blueprint registration order.",
    ),
    (
        "fastapi",
        "Check request model validation errors and dependency injection signatures.",
    ),
    (
        "prisma",
        "Run prisma generate after schema edits and prisma migrate for pending migrations.",
    ),
    (
        "rust",
        "Read the first compiler error only; later ones often cascade from it.",
    ),
    (
        "go",
        "Run go mod tidy after import changes and check for unused imports/variables.",
    ),
    (
        "docker",
        "Confirm the daemon is running and rebuild with --no-cache when layers are stale.",
    ),
    (
        "vite",
        "Restart the dev server after config or env changes; check import aliases.",
    ),
    (
        "webpack",
        "Check loader/resolve configuration for the failing import.",
    ),
    (
        "typescript",
        "Fix the first type error at its source instead of casting at the call site.",
    ),
    (
        "node",
        "Delete node_modules and reinstall when dependency errors persist; check the Node version.",
    ),
    (
        "python",
        "Confirm the active virtualenv and that requirements are installed in it.",
    ),
];

/// Canned one-line advice for a framework tag.
pub fn framework_advice(framework: &str) -> Option<&'static str> {
    FRAMEWORK_ADVICE
        .iter()
        .find(|(name, _)| *name == framework)
        .map(|(_, advice)| *advice)
}

/// `(sub_category, threshold, advice)`: the analyzer emits the advice once a
/// sub-category has been seen at least `threshold` times.
pub(crate) const SUB_CATEGORY_ADVISORIES: &[(&str, usize, &str)] = &[
    (
        "null_reference",
        3,
        "Frequent null/undefined access: add optional chaining or guards at data boundaries.",
    ),
    (
        "module_not_found",
        3,
        "Frequent missing modules: check install steps, path aliases and case-sensitive imports.",
    ),
    (
        "type_mismatch",
        5,
        "Frequent type mismatches: tighten types at API boundaries instead of casting.",
    ),
    (
        "peer_dependency",
        2,
        "Repeated peer dependency conflicts: align versions or pin them in the manifest.",
    ),
    (
        "port_in_use",
        2,
        "Ports keep colliding: stop stale dev servers or make the port configurable.",
    ),
    (
        "merge_conflict",
        2,
        "Repeated merge conflicts: rebase onto the target branch more often.",
    ),
    (
        "out_of_memory",
        2,
        "Repeated out-of-memory failures: raise the heap limit or reduce work per process.",
    ),
    (
        "assertion_failure",
        5,
        "Many failing assertions: run the narrowest failing test first and fix one at a time.",
    ),
    (
        "edit_mismatch",
        3,
        "Edits often miss their target: re-read the file before editing it.",
    ),
];
