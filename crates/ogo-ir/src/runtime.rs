//! The fixed C runtime the generated code links against. Every symbol has a
//! stable `runtime.<name>` key on the flattener side and an `ogo_<name>`
//! entry point on the C side.

use crate::types::Target;
use std::fmt::Display;
use stripmargin::StripMargin;
use strum::EnumIter;
pub use strum::IntoEnumIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum RuntimeSymbol {
    Print,
    PrintInt,
    Malloc,
    StringsEqual,
    StringsUnequal,
    SliceString,
}

impl Display for RuntimeSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime.{}", self.name())
    }
}

impl RuntimeSymbol {
    pub fn name(self) -> &'static str {
        match self {
            RuntimeSymbol::Print => "print",
            RuntimeSymbol::PrintInt => "print_int",
            RuntimeSymbol::Malloc => "malloc",
            RuntimeSymbol::StringsEqual => "strings_equal",
            RuntimeSymbol::StringsUnequal => "strings_unequal",
            RuntimeSymbol::SliceString => "slice_string",
        }
    }

    pub fn c_name(self) -> String {
        format!("ogo_{}", self.name())
    }

    /// C definition of the entry point.
    pub fn definition(self) -> String {
        match self {
            RuntimeSymbol::Print => r#"
                |static inline void ogo_print(ogo_string s) {
                |    fwrite(s.ptr, 1, (size_t)s.len, stderr);
                |}
                |"#
            .strip_margin(),
            RuntimeSymbol::PrintInt => r#"
                |static inline void ogo_print_int(ogo_int i) {
                |    fprintf(stderr, "%lld", (long long)i);
                |}
                |"#
            .strip_margin(),
            RuntimeSymbol::Malloc => r#"
                |static inline void *ogo_malloc(size_t size) {
                |    void *p = calloc(1, size ? size : 1);
                |    if (!p) {
                |        ogo_panic("out of memory");
                |    }
                |    return p;
                |}
                |"#
            .strip_margin(),
            RuntimeSymbol::StringsEqual => r#"
                |static inline ogo_bool ogo_strings_equal(ogo_string a, ogo_string b) {
                |    return a.len == b.len && (a.len == 0 || memcmp(a.ptr, b.ptr, (size_t)a.len) == 0);
                |}
                |"#
            .strip_margin(),
            RuntimeSymbol::StringsUnequal => r#"
                |static inline ogo_bool ogo_strings_unequal(ogo_string a, ogo_string b) {
                |    return a.len != b.len || (a.len != 0 && memcmp(a.ptr, b.ptr, (size_t)a.len) != 0);
                |}
                |"#
            .strip_margin(),
            RuntimeSymbol::SliceString => r#"
                |static inline ogo_string ogo_slice_string(ogo_string s, ogo_int low, ogo_int high, ogo_bool has_high) {
                |    if (!has_high) {
                |        high = s.len;
                |    }
                |    if (low < 0 || high < low || high > s.len) {
                |        fprintf(stderr, "panic: runtime error: slice bounds out of range [%lld:%lld] with length %lld\n",
                |            (long long)low, (long long)high, (long long)s.len);
                |        exit(2);
                |    }
                |    return (ogo_string){s.ptr + low, high - low};
                |}
                |"#
            .strip_margin(),
        }
    }
}

/// Includes, the primitive typedefs, size checks against `target`, the
/// panic helper and the checked integer operations.
pub fn prelude(target: Target) -> String {
    let int = match target.int_size {
        4 => "int32_t",
        _ => "int64_t",
    };
    format!(
        r#"
        |#include <stdbool.h>
        |#include <stddef.h>
        |#include <stdint.h>
        |#include <stdio.h>
        |#include <stdlib.h>
        |#include <string.h>
        |
        |typedef {int} ogo_int;
        |typedef bool ogo_bool;
        |typedef struct {{
        |    const char *ptr;
        |    ogo_int len;
        |}} ogo_string;
        |
        |#define OGO_STR(s) ((ogo_string){{s, (ogo_int)(sizeof(s) - 1)}})
        |
        |_Static_assert(sizeof(ogo_int) == {int_size}, "int size");
        |_Static_assert(sizeof(ogo_bool) == {bool_size}, "bool size");
        |_Static_assert(sizeof(void *) == {pointer_size}, "pointer size");
        |_Static_assert(sizeof(ogo_string) == {string_size}, "string size");
        |
        |__attribute__((noreturn, unused)) static void ogo_panic(const char *msg) {{
        |    fprintf(stderr, "panic: %s\n", msg);
        |    exit(2);
        |}}
        |
        |#define OGO_INT_BITS ((ogo_int)(8 * sizeof(ogo_int)))
        |
        |__attribute__((unused)) static inline ogo_int ogo_div(ogo_int x, ogo_int y) {{
        |    if (y == 0) {{
        |        ogo_panic("runtime error: integer divide by zero");
        |    }}
        |    return y == -1 ? (ogo_int)(0 - (uint64_t)x) : x / y;
        |}}
        |
        |__attribute__((unused)) static inline ogo_int ogo_rem(ogo_int x, ogo_int y) {{
        |    if (y == 0) {{
        |        ogo_panic("runtime error: integer divide by zero");
        |    }}
        |    return y == -1 ? 0 : x % y;
        |}}
        |
        |__attribute__((unused)) static inline ogo_int ogo_shl(ogo_int x, ogo_int n) {{
        |    if (n < 0) {{
        |        ogo_panic("runtime error: negative shift amount");
        |    }}
        |    return n >= OGO_INT_BITS ? 0 : (ogo_int)((uint64_t)x << n);
        |}}
        |
        |__attribute__((unused)) static inline ogo_int ogo_shr(ogo_int x, ogo_int n) {{
        |    if (n < 0) {{
        |        ogo_panic("runtime error: negative shift amount");
        |    }}
        |    if (n >= OGO_INT_BITS) {{
        |        return x < 0 ? -1 : 0;
        |    }}
        |    return x >> n;
        |}}
        |"#,
        int_size = target.int_size,
        bool_size = crate::Type::Bool.size(target),
        pointer_size = target.pointer_size,
        string_size = crate::Type::String.size(target),
    )
    .strip_margin()
}

#[cfg(test)]
mod tests {
    use super::{prelude, IntoEnumIterator, RuntimeSymbol};
    use crate::types::Target;

    #[test]
    fn contract_names() {
        let names: Vec<&str> = RuntimeSymbol::iter().map(RuntimeSymbol::name).collect();
        assert_eq!(
            names,
            ["print", "print_int", "malloc", "strings_equal", "strings_unequal", "slice_string"]
        );
        for s in RuntimeSymbol::iter() {
            assert!(s.definition().contains(&s.c_name()));
        }
        assert_eq!(RuntimeSymbol::SliceString.to_string(), "runtime.slice_string");
    }

    #[test]
    fn prelude_follows_target() {
        let p = prelude(Target {
            int_size: 4,
            pointer_size: 8,
        });
        assert!(p.contains("typedef int32_t ogo_int;"));
        assert!(p.contains("sizeof(ogo_string) == 16"));
        assert!(prelude(Target::default()).contains("typedef int64_t ogo_int;"));
        assert!(p.contains("ogo_panic(\"runtime error: integer divide by zero\");"));
        assert!(p.contains("static inline ogo_int ogo_shr(ogo_int x, ogo_int n) {"));
    }
}
