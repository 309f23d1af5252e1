use illusory_core::{Document, MemoryDocument, NodeId, Options, Rect};

/// Elements to morph between, plus the call-site options for the run.
pub struct Stage {
    pub from: NodeId,
    pub to: NodeId,
    pub options: Options,
}

pub trait Scene {
    fn name(&self) -> &'static str;
    fn build(&self, doc: &MemoryDocument) -> Stage;
}

/// A thumbnail card grows into a centered modal.
pub struct CardToModal;

impl Scene for CardToModal {
    fn name(&self) -> &'static str {
        "card-to-modal"
    }

    fn build(&self, doc: &MemoryDocument) -> Stage {
        let root = doc.root_node();
        let card = doc.append_element(root, "div", Rect::new(40.0, 40.0, 200.0, 120.0));
        doc.set_sheet_style(card, "background-color", "rgb(255, 255, 255)");
        doc.set_sheet_style(card, "border-radius", "12px");
        doc.append_element(card, "img", Rect::new(40.0, 40.0, 200.0, 80.0));

        let modal = doc.append_element(root, "div", Rect::new(240.0, 110.0, 800.0, 500.0));
        doc.set_sheet_style(modal, "background-color", "rgb(255, 255, 255)");
        doc.set_sheet_style(modal, "border-radius", "4px");

        Stage {
            from: card,
            to: modal,
            options: Options::new(),
        }
    }
}

/// A row in a scrolled list expands into a detail pane.
pub struct ListToDetail;

impl Scene for ListToDetail {
    fn name(&self) -> &'static str {
        "list-to-detail"
    }

    fn build(&self, doc: &MemoryDocument) -> Stage {
        let root = doc.root_node();
        let list = doc.append_element(root, "ul", Rect::new(0.0, 0.0, 320.0, 720.0));
        let row = doc.append_element(list, "li", Rect::new(0.0, 160.0, 320.0, 48.0));
        doc.set_attribute(row, "data-row", "3");
        doc.set_attribute(row, "data-testid", "row-3");

        // Translucent target: the two clones cross-fade.
        let detail = doc.append_element(root, "section", Rect::new(320.0, 0.0, 960.0, 720.0));
        doc.set_sheet_style(detail, "background-color", "rgba(20, 20, 20, 0.8)");

        Stage {
            from: row,
            to: detail,
            options: Options::new().with_relative_to(vec![list]),
        }
    }
}

pub fn by_name(name: Option<&str>) -> Box<dyn Scene> {
    match name {
        Some("list-to-detail") => Box::new(ListToDetail),
        _ => Box::new(CardToModal),
    }
}
