// URL path and query construction for the Jenkins remote access API.
//
// Jenkins addresses folder-nested jobs as `/job/a/job/b`, and restricts JSON
// payloads with a `tree=` field selector. Both encodings are fixed so the
// resulting URLs stay byte-identical across client versions.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Bytes escaped inside a query value: everything but `A-Za-z0-9-_.~`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Bytes escaped inside one path segment. `$ & + : = @` stay literal;
/// `/ ; , ?` are escaped along with everything else outside `A-Za-z0-9-_.~`.
const PATH_SEGMENT: &AsciiSet = &QUERY_VALUE
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// Separator between folder segments of a nested job name.
const JOB_SEPARATOR: &str = "/job/";

/// Build a `tree=` query parameter from a list of field selectors.
///
/// The selectors are comma-joined and percent-encoded as a single query
/// value, with spaces as `+`.
pub fn tree_param(fields: &[&str]) -> String {
    let joined = fields.join(",");
    // `%` itself is escaped to `%25`, so `%20` only ever comes from a space.
    let encoded = utf8_percent_encode(&joined, QUERY_VALUE)
        .to_string()
        .replace("%20", "+");
    format!("tree={encoded}")
}

/// Encode a possibly folder-nested job name (`folder/sub/job`) into the
/// path form Jenkins expects after a leading `/job/`.
pub fn encode_job_path(name: &str) -> String {
    name.split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join(JOB_SEPARATOR)
}

/// Percent-escape one path segment.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tree_param_escapes_brackets_and_commas() {
        assert_eq!(
            tree_param(&["views[name,url,jobs[name]]"]),
            "tree=views%5Bname%2Curl%2Cjobs%5Bname%5D%5D"
        );
    }

    #[test]
    fn tree_param_joins_fields_with_commas() {
        assert_eq!(tree_param(&["mode", "nodeName"]), "tree=mode%2CnodeName");
    }

    #[test]
    fn tree_param_escapes_wildcard_and_uses_plus_for_space() {
        assert_eq!(tree_param(&["monitorData[*]"]), "tree=monitorData%5B%2A%5D");
        assert_eq!(tree_param(&["a b~c"]), "tree=a+b~c");
    }

    #[test]
    fn nested_job_names_use_job_separator() {
        assert_eq!(encode_job_path("folder/sub/app"), "folder/job/sub/job/app");
    }

    #[test]
    fn segments_escape_spaces_but_keep_sub_delims() {
        assert_eq!(encode_job_path("my job"), "my%20job");
        assert_eq!(encode_segment("a+b@c:d=e,f;g&h$i"), "a+b@c:d=e%2Cf%3Bg&h$i");
        assert_eq!(encode_job_path("team/a,b;c"), "team/job/a%2Cb%3Bc");
        assert_eq!(encode_segment("what?#%"), "what%3F%23%25");
        assert_eq!(encode_segment("café"), "caf%C3%A9");
    }
}
