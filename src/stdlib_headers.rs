//! Embedded texts for the small set of standard headers this front end can satisfy without a
//! real system include path, so `#include <stddef.h>` and friends work out of the box when a
//! caller hasn't configured `-isystem`. Not a complete libc; enough of each header's typedefs
//! and macros to parse ordinary application code that includes them incidentally.

/// Returns the embedded text for `name` (e.g. `"stddef.h"`), if this front end bundles one.
pub fn lookup(name: &str) -> Option<&'static str> {
    MATCHES.iter().find(|(n, _)| *n == name).map(|(_, text)| *text)
}

const MATCHES: &[(&str, &str)] = &[
    ("stddef.h", STDDEF_H),
    ("stdbool.h", STDBOOL_H),
    ("stdint.h", STDINT_H),
    ("limits.h", LIMITS_H),
    ("float.h", FLOAT_H),
];

const STDDEF_H: &str = r#"
#ifndef __CFRONT_STDDEF_H
#define __CFRONT_STDDEF_H

typedef unsigned long size_t;
typedef long ptrdiff_t;
typedef int wchar_t;

#define NULL ((void *)0)
#define offsetof(type, member) ((size_t)&((type *)0)->member)

#endif
"#;

const STDBOOL_H: &str = r#"
#ifndef __CFRONT_STDBOOL_H
#define __CFRONT_STDBOOL_H

#define true 1
#define false 0
#define __bool_true_false_are_defined 1

#endif
"#;

const STDINT_H: &str = r#"
#ifndef __CFRONT_STDINT_H
#define __CFRONT_STDINT_H

typedef signed char int8_t;
typedef unsigned char uint8_t;
typedef short int16_t;
typedef unsigned short uint16_t;
typedef int int32_t;
typedef unsigned int uint32_t;
typedef long long int64_t;
typedef unsigned long long uint64_t;
typedef long intptr_t;
typedef unsigned long uintptr_t;
typedef long long intmax_t;
typedef unsigned long long uintmax_t;

#define INT8_MIN (-128)
#define INT8_MAX 127
#define UINT8_MAX 255
#define INT16_MIN (-32768)
#define INT16_MAX 32767
#define UINT16_MAX 65535
#define INT32_MIN (-2147483647 - 1)
#define INT32_MAX 2147483647
#define UINT32_MAX 4294967295U
#define INT64_MIN (-9223372036854775807LL - 1)
#define INT64_MAX 9223372036854775807LL
#define UINT64_MAX 18446744073709551615ULL

#endif
"#;

const LIMITS_H: &str = r#"
#ifndef __CFRONT_LIMITS_H
#define __CFRONT_LIMITS_H

#define CHAR_BIT 8
#define SCHAR_MIN (-128)
#define SCHAR_MAX 127
#define UCHAR_MAX 255
#define CHAR_MIN SCHAR_MIN
#define CHAR_MAX SCHAR_MAX
#define SHRT_MIN (-32768)
#define SHRT_MAX 32767
#define USHRT_MAX 65535
#define INT_MIN (-2147483647 - 1)
#define INT_MAX 2147483647
#define UINT_MAX 4294967295U
#define LONG_MIN (-9223372036854775807L - 1)
#define LONG_MAX 9223372036854775807L
#define ULONG_MAX 18446744073709551615UL
#define LLONG_MIN (-9223372036854775807LL - 1)
#define LLONG_MAX 9223372036854775807LL
#define ULLONG_MAX 18446744073709551615ULL

#endif
"#;

const FLOAT_H: &str = r#"
#ifndef __CFRONT_FLOAT_H
#define __CFRONT_FLOAT_H

#define FLT_RADIX 2
#define FLT_MANT_DIG 24
#define FLT_DIG 6
#define DBL_MANT_DIG 53
#define DBL_DIG 15
#define FLT_MIN 1.17549435e-38F
#define FLT_MAX 3.40282347e+38F
#define DBL_MIN 2.2250738585072014e-308
#define DBL_MAX 1.7976931348623157e+308

#endif
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_known_header() {
        assert!(lookup("stdbool.h").is_some());
    }

    #[test]
    fn unknown_header_returns_none() {
        assert!(lookup("not_a_real_header.h").is_none());
    }
}
