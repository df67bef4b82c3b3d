use crate::data::user::User;
use maud::{Markup, Render, html};

pub fn render_table<const N: usize>(
    titles: [&'static str; N],
    items: impl IntoIterator<Item = [Markup; N]>,
) -> Markup {
    html! {
        div class="overflow-x-auto" {
            table class="min-w-full bg-gray-800 rounded shadow-md" {
                thead class="bg-gray-700" {
                    tr {
                        @for title in titles {
                            th class="py-2 px-4 text-left font-semibold text-gray-300" {(title)}
                        }
                    }
                }
                tbody {
                    @for row in items {
                        tr class="hover:bg-gray-700" {
                            @for col in row {
                                td class="py-2 px-4 border-b border-gray-600 text-gray-200" {(col)}
                            }
                        }
                    }
                }
            }
        }
    }
}

pub fn title(s: impl Render) -> Markup {
    html! {
        h1 class="text-2xl font-semibold mb-4" {(s)}
    }
}

pub fn subtitle(s: impl Render) -> Markup {
    html! {
        p class="text-sm text-gray-400" {(s)}
    }
}

pub fn form_element(id: &'static str, label: &'static str, input: Markup) -> Markup {
    html! {
        div class="mb-4" {
            label for=(id) class="block text-gray-300 text-sm font-bold mb-2" {(label)}
            (input)
        }
    }
}

pub fn simple_form_element(
    id: &'static str,
    label: &'static str,
    required: bool,
    input_type: Option<&'static str>,
    value: Option<&str>,
) -> Markup {
    form_element(
        id,
        label,
        html! {
            input type=(input_type.unwrap_or("text")) id=(id) name=(id) required[required] value=[value] class="shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600" {}
        },
    )
}

pub fn form_submit_button(text: Option<&str>) -> Markup {
    html! {
        div class="flex items-center justify-between" {
            button type="submit" class="bg-blue-500 hover:bg-blue-700 font-bold py-2 px-4 rounded focus:outline-none focus:shadow-outline" {
                (text.unwrap_or("Submit"))
            }
        }
    }
}

pub fn render_nav(user: Option<&User>) -> Markup {
    html! {
        nav class="w-full bg-gray-800 shadow mb-8" {
            div class="container mx-auto px-4 py-4 flex items-center justify-between" {
                a href="/" class="text-xl font-bold" {"Roster"}
                @if let Some(user) = user {
                    div class="flex flex-row items-center space-x-4" {
                        a href="/students" class="hover:underline" {"My Students"}
                        form method="post" action="/logout" {
                            button type="submit" class="bg-gray-600 hover:bg-gray-700 py-1 px-3 rounded" {
                                "Log out (" (user.label()) ")"
                            }
                        }
                    }
                } @else {
                    a href="/login" class="hover:underline" {"Login"}
                }
            }
        }
    }
}
