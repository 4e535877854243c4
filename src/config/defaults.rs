//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#false() -> bool {
    false
}

// ============================================================================
// Site Defaults
// ============================================================================

pub mod site {
    pub fn url() -> String {
        "http://localhost:7000/".into()
    }

    pub fn num_threads() -> usize {
        std::thread::available_parallelism().map_or(4, |n| n.get())
    }

    pub fn timezone() -> String {
        "UTC".into()
    }

    pub fn theme() -> String {
        "default".into()
    }

    pub fn pagination1() -> usize {
        10
    }

    pub fn pagination2() -> usize {
        20
    }
}

// ============================================================================
// Directory Defaults
// ============================================================================

pub mod dirs {
    use std::path::PathBuf;

    pub fn content() -> PathBuf {
        "content".into()
    }

    pub fn theme() -> PathBuf {
        "themes".into()
    }

    pub fn output() -> PathBuf {
        "public".into()
    }
}

// ============================================================================
// Path Template Defaults
// ============================================================================

pub mod paths {
    pub fn top() -> String {
        "index.html".into()
    }

    pub fn article() -> String {
        "articles/{{ entry.posted_at.year }}/{{ entry.posted_at.month|pad(2) }}/{{ entry.slug }}.html"
            .into()
    }

    pub fn index() -> String {
        "{% if page == 0 %}index.html{% else %}page/{{ page }}.html{% endif %}".into()
    }

    pub fn tag() -> String {
        "tags/{{ tag }}/{% if page == 0 %}index.html{% else %}{{ page }}.html{% endif %}".into()
    }

    pub fn annual() -> String {
        "archives/{{ year }}/{% if page == 0 %}index.html{% else %}{{ page }}.html{% endif %}".into()
    }

    pub fn monthly() -> String {
        "archives/{{ year }}/{{ month|pad(2) }}/{% if page == 0 %}index.html{% else %}{{ page }}.html{% endif %}"
            .into()
    }

    pub fn include() -> String {
        "{{ name }}".into()
    }

    pub fn feed() -> String {
        "feeds/{{ name }}".into()
    }

    pub fn file() -> String {
        "{{ name }}".into()
    }
}

// ============================================================================
// Title Template Defaults
// ============================================================================

pub mod titles {
    pub fn article() -> String {
        "{{ entry.title }} - {{ site.params.title }}".into()
    }

    pub fn index() -> String {
        "{{ site.params.title }}".into()
    }

    pub fn tag() -> String {
        "{{ tag }} - {{ site.params.title }}".into()
    }

    pub fn annual() -> String {
        "{{ year }} - {{ site.params.title }}".into()
    }

    pub fn monthly() -> String {
        "{{ year }}/{{ month|pad(2) }} - {{ site.params.title }}".into()
    }
}
