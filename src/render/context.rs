//! Per-render data handed to page templates.

use super::{
    RenderError,
    objects::{EntryList, EntryView, SiteObject},
};
use crate::{app::App, content::Entry};
use minijinja::{
    Error, ErrorKind, State, Value,
    value::{Enumerator, Object},
};
use mlua::Lua;
use std::{collections::BTreeMap, fmt::Write, sync::Arc};

/// Pages shown on each side of the current one by [`RenderContext::paginate`].
const PAGINATION_WINDOW: usize = 4;

// ============================================================================
// Pagination
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number.
    pub page: usize,
    pub step: usize,
    pub start: usize,
    pub end: usize,
    pub last_page: usize,
    pub is_first: bool,
    pub is_last: bool,
}

impl Pagination {
    /// Page `page` of `total` entries shown `step` at a time.
    ///
    /// An empty list still has one (empty, last) page.
    pub fn new(page: usize, step: usize, total: usize) -> Self {
        let start = (page.saturating_sub(1) * step).min(total.saturating_sub(1));
        let end = (start + step).min(total);
        Self {
            page,
            step,
            start,
            end,
            last_page: total.div_ceil(step).max(1),
            is_first: page == 1,
            is_last: end == total,
        }
    }
}

/// A paginated list page: which link template it belongs to and the data
/// needed to link its sibling pages.
#[derive(Debug, Clone)]
pub struct Listing {
    /// Link template name, e.g. `Tag`.
    pub name: &'static str,
    pub pagination: Pagination,
    pub path_data: BTreeMap<String, Value>,
}

impl Listing {
    /// Path template data for `page` of this list.
    pub fn link_data(&self, page: usize) -> Value {
        let mut data = self.path_data.clone();
        data.insert("page".into(), Value::from(page));
        Value::from_serialize(&data)
    }
}

// ============================================================================
// View Model
// ============================================================================

/// What a single page shows.
#[derive(Debug, Clone, Default)]
pub struct ViewModel {
    /// Already-escaped page title.
    pub title: String,
    pub entry: Option<Arc<Entry>>,
    /// Entries visible on this page.
    pub entries: Vec<Arc<Entry>>,
    pub tag: Option<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub listing: Option<Listing>,
}

impl ViewModel {
    pub fn with_title(title: String) -> Self {
        Self {
            title,
            ..Default::default()
        }
    }
}

// ============================================================================
// Render Context
// ============================================================================

/// Root object of every page render.
///
/// Carries the application state and the borrowed interpreter explicitly,
/// so helpers reach both through `ctx` instead of globals.
#[derive(Debug)]
pub struct RenderContext {
    app: Arc<App>,
    lua: Lua,
    view: Arc<ViewModel>,
    /// Rendered page body while rendering its layout.
    yielded: Option<Arc<str>>,
}

const FIELDS: &[&str] = &[
    "ctx",
    "site",
    "page_title",
    "entry",
    "entries",
    "tag",
    "year",
    "month",
    "page",
    "last_page",
    "start",
    "end",
    "step",
    "is_first",
    "is_last",
    "list_name",
];

impl RenderContext {
    pub fn new(app: Arc<App>, lua: Lua, view: ViewModel) -> Self {
        Self {
            app,
            lua,
            view: Arc::new(view),
            yielded: None,
        }
    }

    /// Same page, with `yield()` returning `body`.
    pub fn with_yield(&self, body: String) -> Self {
        Self {
            app: Arc::clone(&self.app),
            lua: self.lua.clone(),
            view: Arc::clone(&self.view),
            yielded: Some(body.into()),
        }
    }

    pub(crate) fn from_state(state: &State) -> Result<Arc<Self>, Error> {
        state
            .lookup("ctx")
            .and_then(|ctx| ctx.downcast_object::<Self>())
            .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "not rendering a page"))
    }

    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Numbered page links for the current list page.
    pub fn paginate(&self, anchor_class: &str) -> Result<String, RenderError> {
        let Some(listing) = &self.view.listing else {
            return Ok(String::new());
        };
        let links = &self.app.links;
        let link = |page: usize| links.url(listing.name, listing.link_data(page));

        let last = listing.pagination.last_page;
        let page = match listing.pagination.page {
            p if p > last => 1,
            p => p,
        };
        let first_shown = page.saturating_sub(PAGINATION_WINDOW).max(1);
        let last_shown = (page + PAGINATION_WINDOW).min(last);

        let mut html = String::from(r#"<nav class="paging"><ul>"#);
        // writing into a String cannot fail
        if page <= 1 {
            html.push_str(r#"<li class="previous-off">&laquo;Previous</li>"#);
        } else {
            let _ = write!(
                html,
                r#"<li class="previous"><a href="{}" rel="prev" class="{anchor_class}">&laquo;Previous</a></li>"#,
                link(page - 1)?
            );
        }
        if first_shown != 1 {
            let _ = write!(html, r#"<li><a href="{}" class="{anchor_class}">1</a></li>"#, link(1)?);
        }
        if first_shown > 2 {
            html.push_str("<li>&nbsp;&nbsp;......&nbsp;&nbsp;</li>");
        }
        for i in first_shown..=last_shown {
            if i == page {
                let _ = write!(html, r#"<li class="active">{i}</li>"#);
            } else {
                let _ = write!(html, r#"<li><a href="{}" class="{anchor_class}">{i}</a></li>"#, link(i)?);
            }
        }
        if last_shown + 1 < last {
            html.push_str("<li>&nbsp;&nbsp;......&nbsp;&nbsp;</li>");
        }
        if last_shown != last {
            let _ = write!(html, r#"<li><a href="{}" class="{anchor_class}">{last}</a></li>"#, link(last)?);
        }
        if page + 1 > last {
            html.push_str(r#"<li class="next-off">Next&raquo;</li>"#);
        } else {
            let _ = write!(
                html,
                r#"<li class="next"><a href="{}" rel="next" class="{anchor_class}">Next&raquo;</a></li>"#,
                link(page + 1)?
            );
        }
        html.push_str("</ul></nav>");
        Ok(html)
    }
}

impl Object for RenderContext {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let view = &self.view;
        let pagination = view.listing.as_ref().map(|l| l.pagination);
        let value = match key.as_str()? {
            "ctx" => Value::from_dyn_object(Arc::clone(self)),
            "site" => Value::from_object(SiteObject::new(Arc::clone(&self.app), self.lua.clone())),
            "page_title" => Value::from_safe_string(view.title.clone()),
            "entry" => view
                .entry
                .as_ref()
                .map(|entry| Value::from_object(EntryView::new(Arc::clone(entry), self.lua.clone())))
                .unwrap_or_default(),
            "entries" => Value::from_object(EntryList::new(view.entries.clone(), self.lua.clone())),
            "tag" => view.tag.clone().map(Value::from).unwrap_or_default(),
            "year" => view.year.map(Value::from).unwrap_or_default(),
            "month" => view.month.map(Value::from).unwrap_or_default(),
            "list_name" => view.listing.as_ref().map(|l| Value::from(l.name)).unwrap_or_default(),
            "page" => Value::from(pagination?.page),
            "last_page" => Value::from(pagination?.last_page),
            "start" => Value::from(pagination?.start),
            "end" => Value::from(pagination?.end),
            "step" => Value::from(pagination?.step),
            "is_first" => Value::from(pagination?.is_first),
            "is_last" => Value::from(pagination?.is_last),
            "yield" => {
                let body = Arc::clone(self.yielded.as_ref()?);
                Value::from_function(move || Value::from_safe_string(body.to_string()))
            }
            _ => return None,
        };
        Some(value)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(FIELDS)
    }
}
