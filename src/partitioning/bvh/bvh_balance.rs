use super::{Bvh, NONE};
use crate::bounding_volume::BoundingVolume;

impl Bvh {
    /// Walks from `index` up to the root, rebalancing and recomputing the bound and
    /// height of every node on the way.
    ///
    /// `index` must identify an internal node. This is called after every structural
    /// change (insertion, removal, leaf promotion) and after a dirty leaf shrank.
    pub(super) fn refit_from(&mut self, mut index: u32) {
        while index != NONE {
            index = self.balance(index);

            let [child1, child2] = self.nodes[index as usize].children();
            let aabb = self.nodes[child1 as usize]
                .aabb
                .merged(&self.nodes[child2 as usize].aabb);
            let height = 1 + self.nodes[child1 as usize]
                .height
                .max(self.nodes[child2 as usize].height);

            let node = &mut self.nodes[index as usize];
            node.aabb = aabb;
            node.height = height;

            index = node.parent;
        }
    }

    /// Performs a rotation at node `a` if its children's heights differ by more than
    /// one, and returns the index of the node now sitting at `a`'s position.
    ///
    /// This is the classic dynamic-AABB-tree balancing step: the taller child is
    /// promoted into `a`'s place and its taller grandchild stays with it, bounding
    /// the height of the whole tree and therefore the depth of every query.
    pub(super) fn balance(&mut self, a: u32) -> u32 {
        let node_a = &self.nodes[a as usize];
        if node_a.is_leaf() || node_a.height < 2 {
            return a;
        }

        let [b, c] = node_a.children();
        let balance =
            self.nodes[c as usize].height as i64 - self.nodes[b as usize].height as i64;

        if balance > 1 {
            self.rotate_up(a, c)
        } else if balance < -1 {
            self.rotate_up(a, b)
        } else {
            a
        }
    }

    /// Promotes `tall` (a child of `a`) into `a`'s position.
    fn rotate_up(&mut self, a: u32, tall: u32) -> u32 {
        let [gc1, gc2] = self.nodes[tall as usize].children();

        // `tall` takes `a`'s place.
        let a_parent = self.nodes[a as usize].parent;
        self.nodes[tall as usize].parent = a_parent;
        self.nodes[a as usize].parent = tall;

        if a_parent == NONE {
            self.replace_root(a, tall);
        } else {
            self.nodes[a_parent as usize].replace_child(a, tall);
        }

        // The taller grandchild stays attached to `tall`; the other one replaces
        // `tall` among `a`'s children.
        let (kept, moved) =
            if self.nodes[gc1 as usize].height >= self.nodes[gc2 as usize].height {
                (gc1, gc2)
            } else {
                (gc2, gc1)
            };

        *self.nodes[tall as usize].children_mut() = [a, kept];
        self.nodes[a as usize].replace_child(tall, moved);
        self.nodes[moved as usize].parent = a;
        self.nodes[kept as usize].parent = tall;
        self.refresh_node(a);
        self.refresh_node(tall);

        tall
    }

    /// Recomputes the bound and height of an internal node from its children.
    fn refresh_node(&mut self, index: u32) {
        let [child1, child2] = self.nodes[index as usize].children();
        let aabb = self.nodes[child1 as usize]
            .aabb
            .merged(&self.nodes[child2 as usize].aabb);
        let height = 1 + self.nodes[child1 as usize]
            .height
            .max(self.nodes[child2 as usize].height);

        let node = &mut self.nodes[index as usize];
        node.aabb = aabb;
        node.height = height;
    }
}
